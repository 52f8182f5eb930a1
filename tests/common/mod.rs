//! Shared fixtures and hook recorders for integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use routeflow::navigation::hooks::HookKind;
use routeflow::navigation::HookRegistration;
use routeflow::{MemoryHistory, RouteDecl, RouteNode, Router, RouterOptions, Schema, Transition};

pub const ALL_KINDS: [HookKind; 6] = [
    HookKind::BeforeEnter,
    HookKind::BeforeUpdate,
    HookKind::BeforeLeave,
    HookKind::AfterEnter,
    HookKind::AfterUpdate,
    HookKind::AfterLeave,
];

/// Ordered record of fired hooks, as `kind:route` strings.
#[derive(Clone, Default)]
pub struct HookLog(Rc<RefCell<Vec<String>>>);

impl HookLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.borrow().iter().filter(|e| e.as_str() == entry).count()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// Registers a recording hook of `kind` on `node`.
pub fn record(node: &RouteNode, kind: HookKind, log: &HookLog) -> HookRegistration {
    let log = log.clone();
    let entry = format!("{}:{}", kind, node.key());
    let hook = move |_: Transition| {
        log.record(entry.clone());
        async {}
    };
    match kind {
        HookKind::BeforeEnter => node.before_enter(hook),
        HookKind::BeforeUpdate => node.before_update(hook),
        HookKind::BeforeLeave => node.before_leave(hook),
        HookKind::AfterEnter => node.after_enter(hook),
        HookKind::AfterUpdate => node.after_update(hook),
        HookKind::AfterLeave => node.after_leave(hook),
    }
}

/// Registers recording hooks of every kind on every route.
pub fn record_all(router: &Router, log: &HookLog) -> Vec<HookRegistration> {
    router
        .tree()
        .nodes()
        .iter()
        .flat_map(|node| ALL_KINDS.into_iter().map(move |kind| (node, kind)))
        .map(|(node, kind)| record(node, kind, log))
        .collect()
}

pub fn router(schema: &Schema) -> (Router, MemoryHistory) {
    router_with(schema, RouterOptions::default())
}

pub fn router_with(schema: &Schema, options: RouterOptions) -> (Router, MemoryHistory) {
    let history = MemoryHistory::default();
    let router = Router::new(schema, history.clone(), options).unwrap();
    (router, history)
}

/// `home` on the empty path, a flat `about`, and `users/<id>` with a
/// `tab` query key.
pub fn site_schema() -> Schema {
    Schema::new()
        .route("home", RouteDecl::new().matching(""))
        .route("about", RouteDecl::new())
        .route(
            "users",
            RouteDecl::new().children(
                Schema::new().route("user", RouteDecl::new().matching("*").query(["tab"])),
            ),
        )
}

/// Primary `home` restricted to the `side` group, plus one route per group.
pub fn grouped_schema() -> Schema {
    Schema::new()
        .route("home", RouteDecl::new().matching("").parallel(["side"], Vec::<String>::new()))
        .route("about", RouteDecl::new())
        .route(
            "help",
            RouteDecl::new()
                .group("side")
                .children(Schema::new().route("topic", RouteDecl::new().matching("*"))),
        )
        .route("chat", RouteDecl::new().group("dock"))
}
