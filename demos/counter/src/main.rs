use std::rc::{Rc, Weak};

use anyhow::Context as _;
use trellis_core::prelude::*;

fn step(component: Weak<Component>, delta: i64) -> impl Fn(&Event) {
    move |_| {
        let Some(component) = component.upgrade() else {
            return;
        };
        let result = component.update_with(|s| {
            state! { "count": s["count"].as_i64().unwrap_or(0) + delta }
        });
        if let Err(err) = result {
            log::error!("update failed: {err}");
        }
    }
}

fn counter() -> Config {
    Config::new()
        .app_state(state! { "title": "Trellis counter" })
        .default_state(state! { "count": 0 })
        .route("count/:n", |_, params| {
            let n = params.get(0)?.parse::<i64>().ok()?;
            Some(state! { "count": n })
        })
        .view(|s| {
            let me = Rc::downgrade(s.component);
            h("main")
                .child(s.child("x-title"))
                .child(h("p").child(format!("Count: {}", s.get("count"))))
                .child(h("button").key("inc").on("click", step(me.clone(), 1)).child("Increment"))
                .child(h("button").key("dec").on("click", step(me, -1)).child("Decrement"))
                .into()
        })
}

fn title() -> Config {
    Config::new().view(|s| h("h1").child(s.app_get("title").as_str().unwrap_or_default().to_owned()).into())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let registry = Registry::global();
    registry.define("x-counter", counter)?;
    registry.define("x-title", title)?;

    let frames = Rc::new(FrameQueue::new());
    let location = Rc::new(MemoryLocation::new("#count/10"));
    let host = Host::with_options(HostOptions::new(frames.clone()).location(location.clone()));

    let node = host.create_element("x-counter")?;
    host.append_child(host.body(), node)?;
    let app = host.component(node).context("x-counter was not constructed")?;
    println!("{}", host.outer_html(host.body()));

    let buttons: Vec<NodeId> = {
        let doc = host.document().borrow();
        let main = app.el().context("x-counter has no output")?;
        doc.children(main)
            .iter()
            .copied()
            .filter(|&n| doc.tag(n) == Some("button"))
            .collect()
    };
    let &[inc, dec] = buttons.as_slice() else {
        anyhow::bail!("expected two buttons, found {}", buttons.len());
    };

    for _ in 0..3 {
        host.dispatch_event(inc, "click")?;
    }
    host.dispatch_event(dec, "click")?;
    frames.run_until_idle(8);
    log::info!("count is now {}", app.state()["count"]);
    println!("{}", host.outer_html(host.body()));

    app.update_app(state! { "title": "Renamed" })?;
    location.push("#count/99");
    host.pop_state()?;
    frames.run_until_idle(8);
    println!("{}", host.outer_html(host.body()));
    Ok(())
}
