use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::{Value, json};
use trellis_dom::{FrameQueue, RenderError, h};
use trellis_router::{HistoryMethod, Location, MemoryLocation};

use crate::prelude::*;
use crate::{Phase, StateController, state};

struct Fixture {
    host: Host,
    frames: Rc<FrameQueue>,
    location: Rc<MemoryLocation>,
    registry: Rc<Registry>,
}

fn fixture() -> Fixture {
    fixture_at("")
}

fn fixture_at(hash: &str) -> Fixture {
    let frames = Rc::new(FrameQueue::new());
    let location = Rc::new(MemoryLocation::new(hash));
    let registry = Rc::new(Registry::new());
    let host = Host::with_options(
        HostOptions::new(frames.clone())
            .registry(registry.clone())
            .location(location.clone()),
    );
    Fixture {
        host,
        frames,
        location,
        registry,
    }
}

impl Fixture {
    fn define(&self, tag: &str, factory: impl Fn() -> Config + 'static) {
        self.registry.define(tag, factory).unwrap();
    }

    fn mount(&self, tag: &str) -> Rc<Component> {
        let node = self.host.create_element(tag).unwrap();
        self.host.append_child(self.host.body(), node).unwrap();
        self.host.component(node).unwrap()
    }

    fn text(&self, component: &Component) -> String {
        self.host.text_content(component.el().unwrap())
    }
}

fn label(key: &'static str) -> impl Fn(&TemplateScope<'_>) -> VNode {
    move |s| h("span").child(format!("{key}: {}", s.get(key))).into()
}

#[derive(Default)]
struct CountingContext {
    binds: Cell<u32>,
    unbinds: Cell<u32>,
}

impl Context for CountingContext {
    fn bind_to_component(&self, _component: &Component) {
        self.binds.set(self.binds.get() + 1);
    }

    fn unbind_from_component(&self, _component: &Component) {
        self.unbinds.set(self.unbinds.get() + 1);
    }
}

struct OtherContext;

impl Context for OtherContext {}

#[test]
fn async_updates_render_once_per_frame() {
    let f = fixture();
    f.define("x-counter", || {
        Config::new()
            .default_state(state! { "count": 0 })
            .view(|s| h("p").child(format!("Counter: {}", s.get("count"))).into())
    });
    let counter = f.mount("x-counter");
    assert_eq!(counter.render_count(), 1);

    for n in 1..=3 {
        counter.update(state! { "count": n }).unwrap();
    }
    assert_eq!(f.text(&counter), "Counter: 0");
    assert_eq!(f.frames.pending(), 1);

    f.frames.run_frame();
    assert_eq!(f.text(&counter), "Counter: 3");
    assert_eq!(counter.render_count(), 2);
}

#[test]
fn sync_updates_render_inline() {
    let f = fixture();
    f.define("x-sync", || {
        Config::new()
            .default_state(state! { "count": 0 })
            .view(label("count"))
            .update_sync(true)
    });
    let c = f.mount("x-sync");
    c.update_with(|s| state! { "count": s["count"].as_i64().unwrap_or(0) + 1 })
        .unwrap();
    c.update_with(|s| state! { "count": s["count"].as_i64().unwrap_or(0) + 1 })
        .unwrap();
    assert_eq!(f.text(&c), "count: 2");
    assert_eq!(c.render_count(), 3);
    assert_eq!(f.frames.pending(), 0);
}

#[test]
fn app_state_updates_reach_every_reader_once() {
    let f = fixture();
    f.define("x-app", || {
        Config::new()
            .app_state(state! { "title": "test" })
            .default_state(state! { "count": 5 })
            .view(|s| {
                h("div")
                    .child(h("h1").child(format!("title: {} count: {}", s.app_get("title"), s.get("count"))))
                    .child(s.child("x-leaf"))
                    .into()
            })
    });
    f.define("x-leaf", || {
        Config::new().view(|s| h("em").child(format!("leaf: {}", s.app_get("title"))).into())
    });

    let app = f.mount("x-app");
    let leaf = app.children()[0].clone();
    assert_eq!(leaf.parent().unwrap().id(), app.id());
    assert_eq!(leaf.root().unwrap().id(), app.id());
    assert_eq!(f.text(&leaf), "leaf: \"test\"");

    leaf.update_app(state! { "title": "new" }).unwrap();
    f.frames.run_frame();

    assert_eq!(app.app_state().unwrap()["title"], json!("new"));
    assert_eq!(app.state()["count"], json!(5));
    assert!(f.text(&app).starts_with("title: \"new\" count: 5"));
    assert_eq!(f.text(&leaf), "leaf: \"new\"");
    assert_eq!(app.render_count(), 2);
    assert_eq!(leaf.render_count(), 2);
}

#[test]
fn shared_state_cascade_renders_each_member_once() {
    let f = fixture();
    f.define("x-root", || {
        Config::new()
            .default_state(state! { "n": 0 })
            .view(|s| {
                h("div")
                    .child(format!("root {}", s.get("n")))
                    .child(s.child("x-kid"))
                    .child(s.child("x-iso"))
                    .into()
            })
            .update_sync(true)
    });
    f.define("x-kid", || Config::new().view(label("n")).update_sync(true));
    f.define("x-iso", || {
        Config::new()
            .isolated_state(true)
            .default_state(state! { "n": 100 })
            .view(label("n"))
            .update_sync(true)
    });

    let root = f.mount("x-root");
    let children = root.children();
    let (kid, iso) = (children[0].clone(), children[1].clone());
    assert!(kid.shares_state_with(&root));
    assert!(!iso.shares_state_with(&root));

    kid.update(state! { "n": 1 }).unwrap();
    assert_eq!(root.state()["n"], json!(1));
    assert_eq!(f.text(&kid), "n: 1");
    assert_eq!(kid.render_count(), 2);
    assert_eq!(root.render_count(), 2);

    root.update(state! { "n": 2 }).unwrap();
    assert_eq!(kid.render_count(), 3);
    assert_eq!(root.render_count(), 3);

    assert_eq!(iso.render_count(), 1);
    assert_eq!(iso.state()["n"], json!(100));
}

#[test]
fn should_update_false_commits_state_but_skips_rendering() {
    let f = fixture();
    f.define("x-picky", || {
        Config::new()
            .default_state(state! { "n": 0 })
            .view(|s| h("div").child(format!("n={}", s.get("n"))).child(s.child("x-kid")).into())
            .should_update(|s| s.get("n") != Some(&json!(2)))
            .update_sync(true)
    });
    f.define("x-kid", || Config::new().view(label("n")).update_sync(true));

    let picky = f.mount("x-picky");
    let kid = picky.children()[0].clone();

    picky.update(state! { "n": 1 }).unwrap();
    assert_eq!(picky.render_count(), 2);
    assert_eq!(kid.render_count(), 2);

    picky.update(state! { "n": 2 }).unwrap();
    assert_eq!(picky.state()["n"], json!(2));
    assert_eq!(picky.render_count(), 2);
    assert_eq!(kid.render_count(), 2);
    assert_eq!(f.text(&kid), "n: 1");

    picky.update(state! { "n": 3 }).unwrap();
    assert_eq!(picky.render_count(), 3);
    assert_eq!(f.text(&kid), "n: 3");
}

#[test]
fn routes_drive_state_and_state_drives_the_hash() {
    let f = fixture_at("#item/42");
    f.define("x-routed", || {
        Config::new()
            .route("item/:id", |_, params| Some(state! { "item": params.get(0) }))
            .route("blocked/:id", |_, _| None)
            .view(label("item"))
            .update_sync(true)
    });
    let routed = f.mount("x-routed");
    assert_eq!(routed.state()["item"], json!("42"));
    assert_eq!(routed.state()["$fragment"], json!("item/42"));
    assert_eq!(f.text(&routed), "item: \"42\"");

    f.location.push("#item/7");
    f.host.pop_state().unwrap();
    assert_eq!(f.text(&routed), "item: \"7\"");

    f.location.push("#blocked/1");
    f.host.pop_state().unwrap();
    assert_eq!(routed.state()["$fragment"], json!("item/7"));
    assert_eq!(routed.state()["item"], json!("7"));

    routed.update(state! { "$fragment": "item/9" }).unwrap();
    assert_eq!(f.location.hash(), "#item/9");
    let writes = f.location.len();
    routed.update(state! { "$fragment": "item/9" }).unwrap();
    assert_eq!(f.location.len(), writes);
}

#[test]
fn replace_history_method_rewrites_the_current_entry() {
    let f = fixture_at("#a");
    f.define("x-replacing", || {
        Config::new()
            .route("*path", |_, _| Some(State::new()))
            .history_method(HistoryMethod::Replace)
            .view(label("$fragment"))
    });
    let c = f.mount("x-replacing");
    c.update(state! { "$fragment": "b" }).unwrap();
    assert_eq!(f.location.entries(), vec!["#b".to_string()]);
}

#[test]
fn contexts_resolve_once_and_unbind_a_frame_after_disconnect() {
    let f = fixture();
    let theme = Rc::new(CountingContext::default());
    let provided = theme.clone();
    f.define("x-provider", move || {
        Config::new()
            .default_context("theme", provided.clone())
            .view(|s| h("div").child(s.child("x-consumer")).into())
    });
    f.define("x-consumer", || Config::new().context("theme").view(|_| h("i").into()));

    let provider = f.mount("x-provider");
    let consumer = provider.children()[0].clone();
    assert_eq!(theme.binds.get(), 1);

    let again = consumer.get_context_as::<CountingContext>("theme").unwrap();
    assert!(Rc::ptr_eq(&again, &theme));
    assert_eq!(theme.binds.get(), 1);
    assert!(matches!(
        consumer.get_context_as::<OtherContext>("theme"),
        Err(ContextError::WrongType { .. })
    ));
    assert!(matches!(consumer.get_context(""), Err(ContextError::EmptyName)));

    let slot = provider.el().unwrap();
    let node = consumer.node();
    f.host.remove_child(slot, node).unwrap();
    assert_eq!(consumer.phase(), Phase::Disconnected);
    assert_eq!(theme.unbinds.get(), 0);
    f.frames.run_until_idle(4);
    assert_eq!(theme.unbinds.get(), 1);
    assert!(matches!(
        consumer.get_context("theme"),
        Err(ContextError::NotConnected { .. })
    ));

    f.host.append_child(slot, node).unwrap();
    assert_eq!(theme.binds.get(), 2);

    // moving within a frame keeps the binding
    f.host.remove_child(slot, node).unwrap();
    f.host.append_child(slot, node).unwrap();
    f.frames.run_until_idle(4);
    assert_eq!(theme.binds.get(), 2);
    assert_eq!(theme.unbinds.get(), 1);
    assert!(consumer.is_connected());
}

#[test]
fn unresolved_declared_context_fails_connect() {
    let f = fixture();
    f.define("x-orphan", || Config::new().context("missing").view(|_| h("i").into()));
    let node = f.host.create_element("x-orphan").unwrap();
    let err = f.host.append_child(f.host.body(), node).unwrap_err();
    assert_eq!(
        err,
        ComponentError::Config(ConfigError::UnresolvedContext {
            component: "x-orphan".into(),
            name: "missing".into(),
        })
    );
    assert_eq!(f.host.component(node).unwrap().phase(), Phase::Disconnected);
}

#[test]
fn json_attributes_round_trip() {
    let f = fixture();
    f.define("x-json", || {
        Config::new()
            .attrs_schema(AttrSchema::new().attr("data", AttrSpec::json()))
            .template(|s| Ok(h("pre").child(s.attr("data").map_err(|e| RenderError::new(e.to_string()))?.to_string()).into()))
            .update_sync(true)
    });
    let node = f.host.create_element("x-json").unwrap();
    f.host.set_attribute(node, "data", r#"{"a":[1,2]}"#).unwrap();
    f.host.append_child(f.host.body(), node).unwrap();
    let c = f.host.component(node).unwrap();

    assert_eq!(c.attr("data").unwrap(), json!({"a": [1, 2]}));
    assert_eq!(f.text(&c), r#"{"a":[1,2]}"#);

    f.host.set_attribute(node, "data", "{not json").unwrap();
    assert_eq!(c.attr("data").unwrap(), Value::Null);
    assert_eq!(f.text(&c), "null");

    assert_eq!(
        c.attr("nope"),
        Err(ComponentError::UnknownAttribute {
            component: "x-json".into(),
            key: "nope".into(),
        })
    );
}

#[test]
fn enum_violation_is_rejected_before_mutation() {
    let f = fixture();
    f.define("x-size", || {
        Config::new()
            .attrs_schema_json(json!({"size": {"enum": ["s", "m", "l"], "default": "m"}}))
            .view(|s| h("b").child(s.attr("size").map(Value::to_string).unwrap_or_default()).into())
            .update_sync(true)
    });
    let c = f.mount("x-size");
    let node = c.node();

    let err = f.host.set_attribute(node, "size", "xl").unwrap_err();
    assert!(matches!(err, ComponentError::Config(ConfigError::InvalidEnumValue { .. })));
    assert_eq!(f.host.document().borrow().get_attribute(node, "size"), None);
    assert_eq!(c.attr("size").unwrap(), json!("m"));
    assert_eq!(c.render_count(), 1);

    f.host.set_attribute(node, "size", "l").unwrap();
    assert_eq!(c.attr("size").unwrap(), json!("l"));
    assert_eq!(f.text(&c), "\"l\"");
    assert_eq!(c.render_count(), 2);
}

#[test]
fn invalid_configuration_is_reported() {
    let f = fixture();
    f.define("x-bad-css", || Config::new().css("p { color: red }"));
    assert_eq!(
        f.host.create_element("x-bad-css"),
        Err(ComponentError::Config(ConfigError::CssWithoutShadowDom))
    );

    f.define("x-bad-schema", || {
        Config::new().attrs_schema_json(json!({"flag": {"type": "boolean", "required": true}}))
    });
    assert_eq!(
        f.host.create_element("x-bad-schema"),
        Err(ComponentError::Config(ConfigError::RequiredBoolean { attr: "flag".into() }))
    );
}

#[test]
fn required_attribute_is_checked_at_connect() {
    let f = fixture();
    f.define("x-req", || {
        Config::new()
            .attrs_schema(AttrSchema::new().attr("name", AttrSpec::string().required()))
            .view(|s| h("p").child(s.attr("name").map(Value::to_string).unwrap_or_default()).into())
    });
    let body = f.host.body();
    let node = f.host.create_element("x-req").unwrap();
    assert_eq!(
        f.host.append_child(body, node),
        Err(ComponentError::Config(ConfigError::MissingRequiredAttribute {
            component: "x-req".into(),
            attr: "name".into(),
        }))
    );
    let c = f.host.component(node).unwrap();
    assert!(!c.is_connected());

    f.host.remove_child(body, node).unwrap();
    f.host.set_attribute(node, "name", "ada").unwrap();
    f.host.append_child(body, node).unwrap();
    assert!(c.is_connected());
    assert_eq!(f.text(&c), "\"ada\"");
}

#[test]
fn shadow_dom_gets_styles_and_style_override() {
    let f = fixture();
    f.define("x-styled", || {
        Config::new()
            .use_shadow_dom(true)
            .css("p{color:red}")
            .view(|_| h("p").child("styled").into())
    });
    let node = f.host.create_element("x-styled").unwrap();
    f.host.set_attribute(node, "style-override", "p{color:blue}").unwrap();
    f.host.append_child(f.host.body(), node).unwrap();
    let c = f.host.component(node).unwrap();

    assert_ne!(c.render_root(), node);
    assert_eq!(f.host.document().borrow().shadow_root(node), Some(c.render_root()));
    insta::assert_snapshot!(
        f.host.inner_html(c.render_root()),
        @"<style>p{color:red}p{color:blue}</style><p>styled</p>"
    );
    insta::assert_snapshot!(
        f.host.outer_html(node),
        @r#"<x-styled style-override="p{color:blue}"></x-styled>"#
    );
}

#[test]
fn unknown_logical_parent_is_an_error() {
    let f = fixture();
    f.define("x-kid", || Config::new().view(|_| h("i").into()));
    let node = f.host.create_element("x-kid").unwrap();
    f.host.set_attribute(node, crate::PARENT_ATTR, "c999999").unwrap();
    assert_eq!(
        f.host.append_child(f.host.body(), node),
        Err(ComponentError::Config(ConfigError::ParentNotFound {
            component: "x-kid".into(),
            id: "c999999".into(),
        }))
    );
}

#[test]
fn controlled_components_follow_their_controller() {
    let f = fixture();
    let controller = Rc::new(StateController::new(state! { "label": "a" }));
    let shared = controller.clone();
    f.define("x-ctl", move || {
        Config::new()
            .controller(shared.clone())
            .view(label("label"))
            .update_sync(true)
    });
    let c = f.mount("x-ctl");
    assert_eq!(f.text(&c), "label: \"a\"");
    assert!(c.controller_as::<StateController>().is_some());

    assert_eq!(
        c.update(state! { "label": "x" }),
        Err(ComponentError::UpdateDisabled { component: "x-ctl".into() })
    );

    controller.update(&state! { "label": "b" });
    assert_eq!(f.text(&c), "label: \"b\"");
    assert_eq!(controller.store().subscriber_count(), 1);

    f.host.remove_child(f.host.body(), c.node()).unwrap();
    assert_eq!(controller.store().subscriber_count(), 0);
}

#[test]
fn render_errors_are_isolated_and_reported() {
    let f = fixture();
    f.define("x-flaky", || {
        Config::new()
            .default_state(state! { "fail": false, "n": 0 })
            .template(|s| {
                if s.get("fail") == &json!(true) {
                    return Err(RenderError::new("boom"));
                }
                Ok(h("p").child(format!("ok {}", s.get("n"))).into())
            })
            .update_sync(true)
    });
    f.define("x-steady", || {
        Config::new()
            .default_state(state! { "n": 0 })
            .view(label("n"))
            .update_sync(true)
    });
    f.define("x-panicky", || Config::new().template(|_| panic!("kaboom")));

    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    f.host.subscribe_render_errors(move |e| sink.borrow_mut().push(e.clone()));

    let flaky = f.mount("x-flaky");
    let steady = f.mount("x-steady");

    flaky.update(state! { "fail": true, "n": 1 }).unwrap();
    assert_eq!(f.text(&flaky), "ok 0");
    assert_eq!(events.borrow().len(), 1);
    assert_eq!(events.borrow()[0].tag, "x-flaky");
    assert_eq!(events.borrow()[0].message, "boom");

    steady.update(state! { "n": 1 }).unwrap();
    assert_eq!(f.text(&steady), "n: 1");

    flaky.update(state! { "fail": false }).unwrap();
    assert_eq!(f.text(&flaky), "ok 1");

    let panicky = f.mount("x-panicky");
    assert_eq!(f.host.inner_html(panicky.node()), "<div></div>");
    assert_eq!(f.host.last_render_error().unwrap().message, "kaboom");
    assert_eq!(events.borrow().len(), 2);
}

#[test]
fn initial_state_merges_defaults_and_attributes() {
    let f = fixture();
    f.define("x-seeded", || {
        Config::new()
            .default_state(state! { "a": 1, "b": 1 })
            .view(|_| h("i").into())
    });
    let node = f.host.create_element("x-seeded").unwrap();
    f.host.set_attribute(node, "data-state", r#"{"b": 2, "c": 3}"#).unwrap();
    f.host.set_attribute(node, "state-c", "4").unwrap();
    f.host.set_attribute(node, "state-d", "text").unwrap();

    let c = f.host.component(node).unwrap();
    c.update(state! { "e": true }).unwrap();
    assert_eq!(c.render_count(), 0);

    f.host.append_child(f.host.body(), node).unwrap();
    assert_eq!(
        c.state(),
        state! { "a": 1, "b": 2, "c": 4, "d": "text", "e": true }
    );
    assert_eq!(c.render_count(), 1);
}

#[test]
fn hooks_see_each_partial_and_helpers_are_callable() {
    let f = fixture();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let (pre, post) = (seen.clone(), seen.clone());
    f.define("x-hooked", move || {
        let pre = pre.clone();
        let post = post.clone();
        Config::new()
            .default_state(state! { "name": "ada" })
            .helper("upper", |args| {
                json!(args.first().and_then(Value::as_str).unwrap_or_default().to_uppercase())
            })
            .view(|s| {
                let name = s.helper("upper", &[s.get("name").clone()]).unwrap_or_default();
                h("p").child(name.as_str().unwrap_or_default().to_owned()).into()
            })
            .pre_update(move |p| pre.borrow_mut().push(("pre", p.clone())))
            .post_update(move |p| post.borrow_mut().push(("post", p.clone())))
            .update_sync(true)
    });
    let c = f.mount("x-hooked");
    assert_eq!(f.text(&c), "ADA");

    c.update(state! { "name": "grace" }).unwrap();
    assert_eq!(f.text(&c), "GRACE");
    assert_eq!(
        *seen.borrow(),
        vec![
            ("pre", state! { "name": "grace" }),
            ("post", state! { "name": "grace" }),
        ]
    );
}

#[test]
fn disconnect_keeps_a_private_copy_of_shared_state() {
    let f = fixture();
    f.define("x-root", || {
        Config::new()
            .default_state(state! { "n": 1 })
            .view(|s| h("div").child(s.child("x-kid")).into())
    });
    f.define("x-kid", || Config::new().view(label("n")));

    let root = f.mount("x-root");
    let kid = root.children()[0].clone();
    f.host.remove_child(f.host.body(), root.node()).unwrap();

    assert_eq!(root.phase(), Phase::Disconnected);
    assert_eq!(kid.phase(), Phase::Disconnected);
    assert!(!kid.shares_state_with(&root));
    assert_eq!(kid.state()["n"], json!(1));
    assert!(root.children().is_empty());

    f.host.append_child(f.host.body(), root.node()).unwrap();
    assert!(root.is_connected());
    assert_eq!(root.state()["n"], json!(1));
}

#[test]
fn listeners_can_update_their_component() {
    let f = fixture();
    f.define("x-clicker", || {
        Config::new()
            .default_state(state! { "count": 0 })
            .view(|s| {
                let me = Rc::downgrade(s.component);
                h("button")
                    .on("click", move |_| {
                        if let Some(me) = me.upgrade() {
                            me.update_with(|st| state! { "count": st["count"].as_i64().unwrap_or(0) + 1 })
                                .unwrap();
                        }
                    })
                    .child(format!("clicked {}", s.get("count")))
                    .into()
            })
    });
    let c = f.mount("x-clicker");
    let button = c.el().unwrap();
    let bubbled = Rc::new(Cell::new(0));
    let b = bubbled.clone();
    f.host
        .add_listener(f.host.body(), "click", move |_| b.set(b.get() + 1))
        .unwrap();

    assert_eq!(f.host.dispatch_event(button, "click").unwrap(), 2);
    f.frames.run_frame();
    assert_eq!(f.text(&c), "clicked 1");
    assert_eq!(bubbled.get(), 1);
}

#[test]
fn reattached_member_does_not_roll_back_shared_state() {
    let f = fixture();
    f.define("x-root", || {
        Config::new()
            .default_state(state! { "n": 1 })
            .view(|s| h("div").child(s.child("x-kid")).into())
    });
    f.define("x-kid", || Config::new().view(label("n")));

    let root = f.mount("x-root");
    let kid = root.children()[0].clone();
    let (slot, node) = (root.el().unwrap(), kid.node());

    f.host.remove_child(slot, node).unwrap();
    root.update(state! { "n": 5 }).unwrap();
    kid.update(state! { "k": "mine" }).unwrap();
    assert_eq!(kid.state()["n"], json!(1));

    f.host.append_child(slot, node).unwrap();
    assert!(kid.shares_state_with(&root));
    assert_eq!(root.state()["n"], json!(5));
    assert_eq!(root.state()["k"], json!("mine"));

    f.frames.run_until_idle(4);
    assert_eq!(f.text(&kid), "n: 5");
}

#[test]
fn connecting_member_seeds_shared_state_for_its_tree() {
    let f = fixture();
    f.define("x-root", || {
        Config::new()
            .default_state(state! { "n": 0 })
            .view(|s| {
                h("div")
                    .child(h("b").child(format!("root {}", s.get("n"))))
                    .child(s.child("x-kid").attr("state-n", "9"))
                    .into()
            })
    });
    f.define("x-kid", || Config::new().view(label("n")));

    let root = f.mount("x-root");
    let kid = root.children()[0].clone();
    assert_eq!(root.state()["n"], json!(9));
    assert_eq!(f.text(&kid), "n: 9");

    f.frames.run_until_idle(4);
    assert!(f.text(&root).starts_with("root 9"));
    assert_eq!(root.render_count(), 2);
    assert_eq!(kid.render_count(), 1);
}

#[test]
fn render_error_subscribers_may_trigger_more_failures() {
    let f = fixture();
    let failing = || {
        Config::new()
            .default_state(state! { "fail": false })
            .template(|s| {
                if s.get("fail") == &json!(true) {
                    return Err(RenderError::new(format!("{} failed", s.component.tag())));
                }
                Ok(h("p").child("fine").into())
            })
            .update_sync(true)
    };
    f.define("x-first", failing);
    f.define("x-second", failing);
    let first = f.mount("x-first");
    let second = f.mount("x-second");

    let tags = Rc::new(RefCell::new(Vec::new()));
    let (sink, other) = (tags.clone(), second.clone());
    f.host.subscribe_render_errors(move |e| {
        sink.borrow_mut().push(e.tag.clone());
        if e.tag == "x-first" {
            other.update(state! { "fail": true }).unwrap();
        }
    });

    first.update(state! { "fail": true }).unwrap();
    assert_eq!(*tags.borrow(), vec!["x-first".to_string(), "x-second".to_string()]);
    assert_eq!(f.text(&first), "fine");
    assert_eq!(f.text(&second), "fine");
    assert_eq!(f.host.last_render_error().unwrap().tag, "x-second");
}

#[test]
fn logical_parent_is_found_across_a_shadow_root() {
    let f = fixture();
    f.define("x-shell", || {
        Config::new()
            .use_shadow_dom(true)
            .default_state(state! { "n": 3 })
            .view(|s| h("section").child(s.child("x-kid")).into())
    });
    f.define("x-kid", || Config::new().view(label("n")));

    let shell = f.mount("x-shell");
    let kid = shell.children()[0].clone();
    assert_ne!(shell.render_root(), shell.node());
    assert_eq!(kid.parent().unwrap().id(), shell.id());
    assert!(kid.shares_state_with(&shell));
    assert_eq!(f.text(&kid), "n: 3");
}

#[test]
fn sibling_consumers_share_one_context_instance() {
    let f = fixture();
    let theme = Rc::new(CountingContext::default());
    let provided = theme.clone();
    f.define("x-provider", move || {
        Config::new()
            .default_context("theme", provided.clone())
            .view(|s| h("div").child(s.child("x-consumer")).child(s.child("x-consumer")).into())
    });
    f.define("x-consumer", || Config::new().context("theme").view(|_| h("i").into()));

    let provider = f.mount("x-provider");
    let consumers = provider.children();
    assert_eq!(consumers.len(), 2);
    let a = consumers[0].get_context_as::<CountingContext>("theme").unwrap();
    let b = consumers[1].get_context_as::<CountingContext>("theme").unwrap();
    assert!(Rc::ptr_eq(&a, &b));
    assert!(Rc::ptr_eq(&a, &theme));
    assert_eq!(theme.binds.get(), 2);
}

#[test]
fn attribute_changes_respect_should_update() {
    let f = fixture();
    f.define("x-outer", || Config::new().view(|s| h("div").child(s.child("x-inner")).into()));
    f.define("x-inner", || {
        Config::new()
            .isolated_state(true)
            .default_state(state! { "n": 2 })
            .attrs_schema(AttrSchema::new().attr("tone", AttrSpec::string().default_value("plain")))
            .view(|s| {
                let tone = s.attr("tone").map(Value::to_string).unwrap_or_default();
                h("p").child(format!("{tone} {}", s.get("n"))).into()
            })
            .should_update(|s| s.get("n") != Some(&json!(2)))
            .update_sync(true)
    });

    let outer = f.mount("x-outer");
    let inner = outer.children()[0].clone();
    assert!(!inner.is_root());
    assert_eq!(inner.render_count(), 1);

    f.host.set_attribute(inner.node(), "tone", "loud").unwrap();
    assert_eq!(inner.attr("tone").unwrap(), json!("loud"));
    assert_eq!(inner.render_count(), 1);

    inner.update(state! { "n": 3 }).unwrap();
    assert_eq!(inner.render_count(), 2);
    assert_eq!(f.text(&inner), "\"loud\" 3");
}
