//! Interoperability with code that only knows std errors and anyhow

mod common;

use anyhow::Context as _;
use serde_json::json;
use sling::{raise, Carrier, Handler, Raise, Raised, Selector};

#[derive(Debug, thiserror::Error)]
#[error("query failed")]
struct QueryFailed {
    #[source]
    source: Raised,
}

#[derive(Debug, thiserror::Error)]
#[error("request handler failed")]
struct HandlerFailed {
    #[source]
    source: QueryFailed,
}

#[derive(Debug, thiserror::Error)]
#[error("malformed row {0}")]
struct MalformedRow(u32);

#[derive(Debug, thiserror::Error)]
#[error("disk full")]
struct DiskFull;

fn boxed_call<T>() -> Result<T, Box<dyn std::error::Error + Send + Sync>> {
    Err(Box::new(DiskFull))
}

fn anyhow_disk_call<T>() -> anyhow::Result<T> {
    Err(anyhow::Error::new(DiskFull))
}

fn query<T: std::any::Any>() -> Result<T, Raised> {
    Raise::value(json!({"table": "users", "code": 23505}))
        .message("duplicate key")
        .raise()
}

// Third-party code: catches natively and wraps twice in its own error types.
fn framework_call<T: std::any::Any>() -> Result<T, Raised> {
    query().map_err(|source| {
        Raised::new(HandlerFailed {
            source: QueryFailed { source },
        })
    })
}

fn anyhow_call<T: std::any::Any>() -> anyhow::Result<T> {
    Ok(query().context("loading user").context("rendering profile")?)
}

#[test]
fn test_resolution_through_two_foreign_layers() {
    common::init_test_logging();

    let (table, outer_is_wrapper) = Handler::builder()
        .catch_key("code", 23505, |context| {
            let wrapper = context.wrapper.as_ref().unwrap();
            Ok((context.object.get("table").cloned(), wrapper.is::<HandlerFailed>()))
        })
        .build()
        .unwrap()
        .run(framework_call)
        .unwrap();

    assert_eq!(table, Some(json!("users")));
    assert!(outer_is_wrapper);
}

#[test]
fn test_resolution_through_anyhow_context() {
    common::init_test_logging();

    let message = Handler::builder()
        .catch_key("code", 23505, |context| Ok(context.message.clone()))
        .build()
        .unwrap()
        .run(|| anyhow_call().map_err(Raised::from))
        .unwrap();

    assert_eq!(message.as_deref(), Some("duplicate key"));
}

#[test]
fn test_no_match_rethrows_foreign_wrapper() {
    common::init_test_logging();

    let err = Handler::<()>::builder()
        .catch_key("code", 1, |_| Ok(()))
        .build()
        .unwrap()
        .run(framework_call)
        .unwrap_err();

    assert!(err.is::<HandlerFailed>());
}

#[test]
fn test_carrier_readable_without_handler() {
    common::init_test_logging();

    let err = query::<()>().unwrap_err();
    let carrier = err.downcast_ref::<Carrier>().expect("payload travels in a carrier");

    assert!(carrier.message().starts_with("duplicate key: "));
    assert!(carrier.cause().is_none());
    assert_eq!(carrier.object().get("table"), Some(&json!("users")));

    let data = carrier.data();
    assert_eq!(data["message"], "duplicate key");
    assert_eq!(data["object"]["fields"]["code"], 23505);
    assert!(data["bindings"].is_object());
}

#[test]
fn test_anyhow_sees_carrier_in_chain() {
    common::init_test_logging();

    let err = anyhow_call::<()>().unwrap_err();
    let carrier = err
        .chain()
        .find_map(|e| e.downcast_ref::<Raised>().and_then(|r| r.downcast_ref::<Carrier>()));
    assert!(carrier.is_some());
    assert_eq!(err.to_string(), "rendering profile");
}

#[test]
fn test_plain_errors_are_caught() {
    common::init_test_logging();

    let row = Handler::builder()
        .catch_type::<MalformedRow>(|row, context| {
            assert!(context.bindings.is_none());
            Ok(row.0)
        })
        .build()
        .unwrap()
        .run(|| Err(Raised::new(MalformedRow(12))))
        .unwrap();

    assert_eq!(row, 12);
}

#[test]
fn test_boxed_errors_are_caught() {
    common::init_test_logging();

    let caught = Handler::builder()
        .catch(Selector::any(), |context| Ok(context.message.clone()))
        .build()
        .unwrap()
        .run(|| {
            let boxed: Box<dyn std::error::Error + Send + Sync> = "disk quota exceeded".into();
            Err(Raised::from(boxed))
        })
        .unwrap();

    assert_eq!(caught.as_deref(), Some("disk quota exceeded"));
}

#[test]
fn test_reraised_carrier_keeps_payload() {
    common::init_test_logging();

    let first = query::<()>().unwrap_err();
    let again = raise::<()>(first).unwrap_err();
    let context = sling::resolve_context(&again);
    assert_eq!(context.object.get("code"), Some(&json!(23505)));
    assert!(!context.object.is_error());
}

#[test]
fn test_boxed_error_caught_by_type() {
    common::init_test_logging();

    let message = Handler::builder()
        .catch_error::<DiskFull>(|error, context| {
            assert!(context.bindings.is_none());
            Ok(format!("{} / {:?}", error, context.message))
        })
        .build()
        .unwrap()
        .run(|| boxed_call().map_err(Raised::from))
        .unwrap();

    assert_eq!(message, "disk full / Some(\"disk full\")");
}

#[test]
fn test_anyhow_error_caught_by_type() {
    common::init_test_logging();

    let caught = Handler::builder()
        .catch(Selector::error::<MalformedRow>(), |_| Ok("row"))
        .catch_error::<DiskFull>(|_, _| Ok("disk"))
        .build()
        .unwrap()
        .run(|| anyhow_disk_call().map_err(Raised::from))
        .unwrap();

    assert_eq!(caught, "disk");
}

#[test]
fn test_anyhow_context_still_caught_by_type() {
    common::init_test_logging();

    let caught = Handler::builder()
        .catch(Selector::error::<DiskFull>(), |context| Ok(context.message.clone()))
        .build()
        .unwrap()
        .run(|| anyhow_disk_call().context("writing report").map_err(Raised::from))
        .unwrap();

    assert_eq!(caught.as_deref(), Some("writing report"));
}

#[test]
fn test_unmatched_boxed_error_propagates() {
    common::init_test_logging();

    let err = Handler::<()>::builder()
        .catch_error::<MalformedRow>(|_, _| Ok(()))
        .build()
        .unwrap()
        .run(|| boxed_call().map_err(Raised::from))
        .unwrap_err();

    assert!(err.is::<DiskFull>());
    assert!(!err.is::<MalformedRow>());
}
