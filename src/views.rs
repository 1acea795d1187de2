// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-rendered HTML views.
//!
//! Templates are compiled into the binary and registered once at startup.
//! Handlebars HTML-escapes every `{{value}}`, so user-controlled strings
//! (usernames, redirect targets) are safe to interpolate.

use anyhow::Context;
use axum::response::Html;
use handlebars::Handlebars;
use serde::Serialize;

const TEMPLATES: &[(&str, &str)] = &[
    ("header", include_str!("../templates/header.hbs")),
    ("footer", include_str!("../templates/footer.hbs")),
    ("login", include_str!("../templates/login.hbs")),
    ("loading", include_str!("../templates/loading.hbs")),
    ("redirect", include_str!("../templates/redirect.hbs")),
    ("access_denied", include_str!("../templates/access_denied.hbs")),
    (
        "insufficient_permissions",
        include_str!("../templates/insufficient_permissions.hbs"),
    ),
    ("page", include_str!("../templates/page.hbs")),
];

pub struct Views {
    registry: Handlebars<'static>,
}

impl Views {
    pub fn new() -> anyhow::Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        for (name, source) in TEMPLATES {
            registry
                .register_template_string(name, source)
                .with_context(|| format!("Failed to compile template {name}"))?;
        }
        Ok(Self { registry })
    }

    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> anyhow::Result<Html<String>> {
        let html = self
            .registry
            .render(name, data)
            .with_context(|| format!("Failed to render template {name}"))?;
        Ok(Html(html))
    }
}
