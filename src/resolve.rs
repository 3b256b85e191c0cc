//! Deep resolution of [`Value`] trees.
//!
//! The tree is walked with an explicit work list rather than by recursion, so
//! nesting depth is bounded by memory, not by the task's stack.

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use serde_json::Value as Json;

use crate::error::Error;
use crate::value::Value;

/// One node of the tree being resolved. Children are referenced by index and
/// always sit after their parent.
enum Slot {
    Done(Json),
    Array(Vec<usize>),
    Object(Vec<(String, usize)>),
}

/// Resolves every [`Deferred`](crate::Deferred) inside `value`, however deeply
/// nested, and returns the result as plain JSON.
///
/// - Arrays keep their order and length; objects keep their keys and key order.
/// - Every pending placeholder in the tree is awaited concurrently; a
///   container is complete once all of its children are.
/// - A deferred value that resolves to a container is resolved in turn.
/// - The first failure anywhere in the tree fails the whole resolution.
///
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), api_router::Error> {
/// use api_router::{Deferred, Value, resolve};
///
/// let value = Value::object([
///     ("a", Value::from(1)),
///     ("b", Deferred::resolved(2).into()),
/// ]);
/// assert_eq!(resolve(value).await?, serde_json::json!({ "a": 1, "b": 2 }));
/// # Ok(())
/// # }
/// ```
pub async fn resolve(value: Value) -> Result<Json, Error> {
    let mut slots = vec![Slot::Done(Json::Null)];
    let mut ready = vec![(0, value)];
    let mut pending = FuturesUnordered::new();

    loop {
        while let Some((id, value)) = ready.pop() {
            let slot = match value {
                Value::Null => Slot::Done(Json::Null),
                Value::Bool(b) => Slot::Done(Json::Bool(b)),
                Value::Number(n) => Slot::Done(Json::Number(n)),
                Value::String(s) => Slot::Done(Json::String(s)),
                Value::Deferred(deferred) => {
                    pending.push(async move { (id, deferred.await) });
                    continue;
                }
                Value::Array(items) => {
                    let mut children = Vec::with_capacity(items.len());
                    for item in items {
                        children.push(reserve(&mut slots, &mut ready, item));
                    }
                    Slot::Array(children)
                }
                Value::Object(entries) => {
                    let mut children = Vec::with_capacity(entries.len());
                    for (key, item) in entries {
                        children.push((key, reserve(&mut slots, &mut ready, item)));
                    }
                    Slot::Object(children)
                }
            };
            slots[id] = slot;
        }

        match pending.next().await {
            Some((id, settled)) => ready.push((id, settled?)),
            None => break,
        }
    }

    Ok(assemble(slots))
}

fn reserve(slots: &mut Vec<Slot>, ready: &mut Vec<(usize, Value)>, value: Value) -> usize {
    let id = slots.len();
    slots.push(Slot::Done(Json::Null));
    ready.push((id, value));
    id
}

/// Builds the JSON bottom-up. Walking the slots in reverse visits every child
/// before its parent.
fn assemble(slots: Vec<Slot>) -> Json {
    let mut built: Vec<Json> = Vec::with_capacity(slots.len());
    built.resize_with(slots.len(), || Json::Null);

    for (id, slot) in slots.into_iter().enumerate().rev() {
        built[id] = match slot {
            Slot::Done(json) => json,
            Slot::Array(children) => Json::Array(
                children.into_iter().map(|child| built[child].take()).collect(),
            ),
            Slot::Object(children) => Json::Object(
                children.into_iter().map(|(key, child)| (key, built[child].take())).collect(),
            ),
        };
    }

    built.swap_remove(0)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::error::ApiError;
    use crate::value::Deferred;

    fn later(value: impl Into<Value> + Send + 'static, ms: u64) -> Value {
        Value::deferred(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok::<_, Error>(value)
        })
    }

    #[tokio::test]
    async fn scalars_resolve_to_themselves() {
        assert_eq!(resolve(Value::Null).await.unwrap(), Json::Null);
        assert_eq!(resolve(Value::from("ok")).await.unwrap(), json!("ok"));
        assert_eq!(resolve(Value::from(3.5)).await.unwrap(), json!(3.5));
    }

    #[tokio::test]
    async fn nested_placeholders_are_replaced_in_place() {
        let value = Value::object([
            ("a", Value::from(1)),
            ("b", Deferred::resolved(2).into()),
            ("list", Value::array([
                later("slow", 20),
                later("fast", 1),
                Value::from(vec![later(true, 5)]),
            ])),
            ("inner", Value::object([("z", later(Value::object([("deep", later(9, 2))]), 3))])),
        ]);

        let resolved = resolve(value).await.unwrap();
        assert_eq!(
            resolved,
            json!({
                "a": 1,
                "b": 2,
                "list": ["slow", "fast", [true]],
                "inner": { "z": { "deep": 9 } },
            })
        );

        let keys: Vec<_> = resolved.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["a", "b", "list", "inner"]);
    }

    #[tokio::test]
    async fn deferred_wrapping_deferred_unwraps_fully() {
        let value = Value::from(Deferred::resolved(Deferred::resolved(Deferred::resolved("x"))));
        assert_eq!(resolve(value).await.unwrap(), json!("x"));
    }

    #[tokio::test]
    async fn empty_containers_resolve() {
        assert_eq!(resolve(Value::Array(Vec::new())).await.unwrap(), json!([]));
        assert_eq!(resolve(Value::Object(Vec::new())).await.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn any_nested_failure_fails_the_whole_tree() {
        let value = Value::object([
            ("ok", later(1, 1)),
            ("bad", Value::array([Value::from(Deferred::rejected(ApiError::not_found("gone")))])),
        ]);

        let err = resolve(value).await.unwrap_err();
        assert_eq!(err.as_api(), Some(&ApiError::not_found("gone")));
    }

    #[tokio::test]
    async fn deep_structures_resolve() {
        const DEPTH: usize = 20_000;

        let mut value = Value::from("bottom");
        for level in 0..DEPTH {
            value = match level % 3 {
                0 => Value::array([Value::from(Deferred::resolved(value))]),
                1 => Value::object([("next", value)]),
                _ => Value::from(Deferred::resolved(value)),
            };
        }

        let mut resolved = resolve(value).await.unwrap();
        // Unwrap one level at a time so the result is never dropped recursively.
        loop {
            resolved = match resolved {
                Json::Array(mut items) => items.pop().unwrap(),
                Json::Object(mut entries) => entries.remove("next").unwrap(),
                leaf => break assert_eq!(leaf, json!("bottom")),
            };
        }
    }

    #[tokio::test]
    async fn deferred_resolving_to_a_container_keeps_its_position() {
        let value = Value::array([
            Value::from(1),
            later(Value::array([later("x", 5), Value::from(Deferred::resolved(Value::object([("k", later(2, 1))])))]), 2),
            Value::from(3),
        ]);
        assert_eq!(resolve(value).await.unwrap(), json!([1, ["x", { "k": 2 }], 3]));
    }
}
