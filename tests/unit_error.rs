use ferrous_compose::{Scope, Shared, ShareError, SharedComposable};
use std::collections::HashMap;
use std::error::Error;

#[test]
fn test_error_display() {
    let scope = Scope::new();
    let id = scope.id();

    let err = ShareError::ScopeDestroyed(id);
    assert_eq!(err.to_string(), format!("{} is already destroyed", id));

    let err = ShareError::Circular(vec!["a@scope#1[1]".to_string(), "a@scope#1[1]".to_string()]);
    assert_eq!(err.to_string(), "Circular construction: a@scope#1[1] -> a@scope#1[1]");

    let err = ShareError::DepthExceeded(8);
    assert_eq!(err.to_string(), "Max construction depth 8 exceeded");

    let err = ShareError::NoAmbientScope;
    assert_eq!(err.to_string(), "No ambient scope is active on this thread");

    let err = ShareError::HookPanicked { scope: id, count: 2 };
    assert_eq!(err.to_string(), format!("2 destruction hook(s) panicked while destroying {}", id));

    let err = ShareError::InvalidConfig { key: "COMPOSE_MAX_CONSTRUCTION_DEPTH".to_string(), value: "x".to_string() };
    assert_eq!(err.to_string(), r#"Invalid configuration value for COMPOSE_MAX_CONSTRUCTION_DEPTH: "x""#);
}

#[test]
fn test_factory_error_keeps_source() {
    let composable: SharedComposable<u16, u16> =
        SharedComposable::try_new(|_: &u16| Err("element not mounted".into()));
    let scope = Scope::new();

    let err = composable.get(&scope, &5).unwrap_err();
    match &err {
        ShareError::Factory { composable, key, .. } => {
            assert_eq!(composable, "u16");
            assert_eq!(key.as_str(), "5");
        }
        other => panic!("expected Factory, got {:?}", other),
    }
    assert_eq!(err.source().unwrap().to_string(), "element not mounted");
    assert_eq!(err.to_string(), "Factory `u16` failed for 5: element not mounted");
}

#[test]
fn test_unserializable_args() {
    let composable = SharedComposable::new(|m: &HashMap<(u8, u8), u8>| Shared::new(m.len()));
    let scope = Scope::new();
    let mut args = HashMap::new();
    args.insert((1, 2), 3);

    match composable.get(&scope, &args) {
        Err(ShareError::Unserializable { type_name, .. }) => assert!(type_name.contains("HashMap")),
        other => panic!("expected Unserializable, got {:?}", other),
    }
    assert_eq!(composable.scope_count(), 0);
}

#[test]
fn test_errors_are_send_sync_clone() {
    fn assert_traits<T: Send + Sync + Clone + 'static>() {}
    assert_traits::<ShareError>();

    let err = ShareError::NoAmbientScope;
    let cloned = err.clone();
    assert!(matches!(cloned, ShareError::NoAmbientScope));
    assert!(err.source().is_none());
}
