// Product catalog routes: status, search, get, create, delete
use super::{helpers as h, Module};
use crate::catalog::{Catalog, Product};
use crate::context::Context;
use crate::http::{HttpRequest, HttpResponse};
use std::sync::Arc;

pub fn default_config() -> toml::Table {
    let mut t = toml::Table::new();
    t.insert("enabled".into(), toml::Value::Boolean(true));
    t.insert("seed_demo_data".into(), toml::Value::Boolean(true));
    t
}

pub fn register(ctx: &mut super::ModuleContext) {
    if !h::is_enabled(ctx.config, "catalog_api") { return; }
    let catalog = Arc::clone(&ctx.services.catalog);
    ctx.pipeline.add(Box::new(CatalogApi { catalog }));
}

struct CatalogApi {
    catalog: Arc<Catalog>,
}

enum Route<'a> {
    Status,
    Search,
    Get(&'a str),
    Create,
    Delete(&'a str),
}

fn route<'a>(method: &str, path: &'a str) -> Option<Route<'a>> {
    let path = path.trim_end_matches('/');
    if path == "/status" {
        return (method == "GET").then_some(Route::Status);
    }
    if path == "/products" {
        return (method == "POST").then_some(Route::Create);
    }
    let id = path.strip_prefix("/products/")?;
    if id.is_empty() || id.contains('/') { return None; }
    match method {
        "GET" if id == "search" => Some(Route::Search),
        "GET" => Some(Route::Get(id)),
        "DELETE" => Some(Route::Delete(id)),
        _ => None,
    }
}

fn note(c: &Context, msg: &str) {
    match h::logger(c) {
        Some(l) => l.info(msg),
        None => crate::log::info(msg),
    }
}

impl Module for CatalogApi {
    fn name(&self) -> &str { "catalog_api" }

    fn handle(&self, r: &mut HttpRequest, c: &mut Context) -> Option<HttpResponse> {
        let resp = match route(&r.method, r.route())? {
            Route::Status => {
                note(c, "checking status");
                h::respond(200, "Running", None)
            }
            Route::Search => {
                note(c, "searching products");
                match r.query_param("keyword").filter(|k| !k.is_empty()) {
                    Some(k) => h::respond(200, h::SUCCESS, to_data(&self.catalog.search(&k))),
                    None => h::respond(400, "invalid search", None),
                }
            }
            Route::Get(code) => match self.catalog.get(code) {
                Some(p) => h::respond(200, h::SUCCESS, to_data(&p)),
                None => h::respond(204, h::SUCCESS, None),
            },
            Route::Create => self.create(&r.body, c),
            Route::Delete(code) => match self.catalog.del(code) {
                Ok(()) => h::respond(200, h::SUCCESS, None),
                Err(e) => h::respond(400, &e.to_string(), None),
            },
        };
        Some(resp)
    }
}

impl CatalogApi {
    fn create(&self, body: &[u8], c: &Context) -> HttpResponse {
        let items: Vec<Product> = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(_) => return h::respond(400, "invalid product data", None),
        };
        if items.is_empty() {
            return h::respond(204, "no product data supplied", None);
        }
        match self.catalog.put(items) {
            Ok(created) => h::respond(200, h::SUCCESS, to_data(&created)),
            Err(errs) => {
                let msgs: Vec<String> = errs.iter().map(|e| e.to_string()).collect();
                note(c, &format!("error creating products [ERR: {}]", msgs.join("; ")));
                h::respond(500, "unable to create product", to_data(&msgs))
            }
        }
    }
}

fn to_data<T: serde::Serialize>(v: &T) -> Option<serde_json::Value> {
    match serde_json::to_value(v) {
        Ok(v) => Some(v),
        Err(e) => {
            crate::log::error(&format!("marshaling data: {e}"));
            None
        }
    }
}
