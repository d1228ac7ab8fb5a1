/// Example: Sharing an event listener between components
///
/// A window event source accepts listeners. Several components want mouse
/// coordinates, but only one listener should be registered per page, and it
/// must be removed once the last component unmounts.

use ferrous_compose::{ComposableBuilder, ComposeConfig, LoggingObserver, MetricsObserver, Scope, Shared, ShareResult};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

// ===== Event Source =====

type Callback = Box<dyn Fn(i32, i32) + Send + Sync>;

#[derive(Default)]
pub struct EventSource {
    next_id: AtomicU64,
    listeners: Mutex<BTreeMap<u64, (String, Callback)>>,
}

impl EventSource {
    pub fn add_listener(&self, event: &str, callback: Callback) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().unwrap().insert(id, (event.to_string(), callback));
        println!("  + listener #{} for '{}'", id, event);
        id
    }

    pub fn remove_listener(&self, id: u64) {
        if let Some((event, _)) = self.listeners.lock().unwrap().remove(&id) {
            println!("  - listener #{} for '{}'", id, event);
        }
    }

    pub fn dispatch(&self, event: &str, x: i32, y: i32) {
        for (name, callback) in self.listeners.lock().unwrap().values() {
            if name == event {
                callback(x, y);
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

// ===== Shared Mouse Position =====

#[derive(Default)]
pub struct MousePosition {
    x: AtomicU64,
    y: AtomicU64,
}

impl MousePosition {
    pub fn get(&self) -> (u64, u64) {
        (self.x.load(Ordering::SeqCst), self.y.load(Ordering::SeqCst))
    }
}

fn main() -> ShareResult<()> {
    let window = Arc::new(EventSource::default());
    let metrics = Arc::new(MetricsObserver::new());

    let source = window.clone();
    let use_mouse = ComposableBuilder::new()
        .name("use-mouse")
        .observer(Arc::new(LoggingObserver::new()))
        .observer(metrics.clone())
        .config(ComposeConfig::from_env()?)
        .shared(move |event: &str| {
            let position = Arc::new(MousePosition::default());
            let target = position.clone();
            let id = source.add_listener(
                event,
                Box::new(move |x, y| {
                    target.x.store(x.max(0) as u64, Ordering::SeqCst);
                    target.y.store(y.max(0) as u64, Ordering::SeqCst);
                }),
            );
            let source = source.clone();
            Shared::from_arc(position).with_cleanup(move || source.remove_listener(id))
        });

    println!("=== Mounting three components on one page ===");
    let page = Scope::labeled("page");
    let header = page.consumer()?;
    let canvas = page.consumer()?;
    let tooltip = page.consumer()?;

    let a = use_mouse.get(&header, "mousemove")?;
    let b = use_mouse.get(&canvas, "mousemove")?;
    let c = use_mouse.get(&tooltip, "mousemove")?;
    assert!(Arc::ptr_eq(&a, &b) && Arc::ptr_eq(&b, &c));
    println!("listeners registered: {}", window.listener_count());

    window.dispatch("mousemove", 120, 48);
    println!("tooltip sees {:?}", c.get());

    println!("\n=== Unmounting ===");
    header.destroy()?;
    canvas.destroy()?;
    println!("listeners after two unmounts: {}", window.listener_count());
    tooltip.destroy()?;
    println!("listeners after the last unmount: {}", window.listener_count());

    println!("\n=== A second page gets its own listener ===");
    let other = Scope::labeled("settings");
    other.run(|| use_mouse.get_current("mousemove"))?;
    println!("listeners registered: {}", window.listener_count());
    other.destroy()?;
    page.destroy()?;

    println!(
        "\nconstructions={} reuses={} cleanups={}",
        metrics.constructions(),
        metrics.reuses(),
        metrics.cleanups()
    );
    Ok(())
}
