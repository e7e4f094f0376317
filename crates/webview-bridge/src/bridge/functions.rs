//! Host functions reachable from page script
//!
//! Every entry of the [`FunctionTable`] is a [`BoundFunction`]: a tagged
//! callable taking the positional JSON arguments of one call. Typed
//! constructors decode arguments and encode results through serde, so a
//! mismatch surfaces as a `TypeError` and an unencodable result as a
//! `SerializationError`, both as ordinary call failures.

use crate::bridge::protocol::{CallOutcome, ErrorDescriptor, Thrown};
use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

type SyncFn = Rc<dyn Fn(Vec<Value>) -> CallOutcome>;
type AsyncFn = Rc<dyn Fn(Vec<Value>) -> LocalBoxFuture<'static, CallOutcome>>;

/// Host-side callable with a uniform invocation signature
#[derive(Clone)]
pub enum BoundFunction {
    /// Completes during the call
    Sync(SyncFn),
    /// Completes when the returned future settles
    Async(AsyncFn),
}

impl BoundFunction {
    /// Wrap a function over raw JSON arguments
    pub fn from_fn<F>(function: F) -> Self
    where
        F: Fn(Vec<Value>) -> CallOutcome + 'static,
    {
        BoundFunction::Sync(Rc::new(function))
    }

    /// Wrap an async function over raw JSON arguments
    pub fn from_async<F, Fut>(function: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + 'static,
        Fut: Future<Output = CallOutcome> + 'static,
    {
        BoundFunction::Async(Rc::new(move |args| function(args).boxed_local()))
    }

    /// Wrap a typed function
    ///
    /// `A` is decoded from the argument array, so it is usually a tuple:
    /// `(String,)` for one string argument, `(i64, i64)` for two numbers,
    /// or `Vec<Value>` for any arguments.
    pub fn typed<A, R, E, F>(function: F) -> Self
    where
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
        E: Into<Thrown> + 'static,
        F: Fn(A) -> Result<R, E> + 'static,
    {
        Self::from_fn(move |args| {
            let args = decode_args::<A>(args)?;
            let result = function(args).map_err(Into::<Thrown>::into)?;
            encode_result(&result)
        })
    }

    /// Wrap a typed async function
    pub fn typed_async<A, R, E, F, Fut>(function: F) -> Self
    where
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
        E: Into<Thrown> + 'static,
        F: Fn(A) -> Fut + 'static,
        Fut: Future<Output = Result<R, E>> + 'static,
    {
        let function = Rc::new(function);
        Self::from_async(move |args| {
            let function = Rc::clone(&function);
            async move {
                let args = decode_args::<A>(args)?;
                let result = function(args).await.map_err(Into::<Thrown>::into)?;
                encode_result(&result)
            }
        })
    }

    pub fn is_async(&self) -> bool {
        matches!(self, BoundFunction::Async(_))
    }

    /// Run the function to completion
    pub async fn invoke(&self, args: Vec<Value>) -> CallOutcome {
        match self {
            BoundFunction::Sync(function) => function(args),
            BoundFunction::Async(function) => function(args).await,
        }
    }
}

impl fmt::Debug for BoundFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundFunction::Sync(_) => write!(f, "BoundFunction::Sync"),
            BoundFunction::Async(_) => write!(f, "BoundFunction::Async"),
        }
    }
}

fn decode_args<A: DeserializeOwned>(args: Vec<Value>) -> Result<A, Thrown> {
    serde_json::from_value(Value::Array(args))
        .map_err(|e| ErrorDescriptor::type_error(format!("Invalid arguments: {}", e)).into())
}

fn encode_result<R: Serialize>(result: &R) -> CallOutcome {
    serde_json::to_value(result).map_err(|e| ErrorDescriptor::serialization(e).into())
}

/// Name → function mapping consulted for every inbound call
#[derive(Default)]
pub struct FunctionTable {
    entries: RefCell<HashMap<String, BoundFunction>>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a function, returning the previous one
    pub fn insert(&self, name: impl Into<String>, function: BoundFunction) -> Option<BoundFunction> {
        self.entries.borrow_mut().insert(name.into(), function)
    }

    pub fn remove(&self, name: &str) -> Option<BoundFunction> {
        self.entries.borrow_mut().remove(name)
    }

    /// Look up a function; the clone is cheap and holds no table borrow
    pub fn get(&self, name: &str) -> Option<BoundFunction> {
        self.entries.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    /// Sorted function names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTable")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn run<F: Future>(future: F) -> F::Output {
        futures_util::FutureExt::now_or_never(future).expect("future should be ready")
    }

    #[test]
    fn test_typed_function_decodes_tuple_args() {
        let greet = BoundFunction::typed(|(name,): (String,)| Ok::<_, Thrown>(format!("hi {}", name)));
        assert_eq!(run(greet.invoke(vec![json!("bob")])), Ok(json!("hi bob")));
    }

    #[test]
    fn test_typed_function_rejects_bad_args() {
        let add = BoundFunction::typed(|(a, b): (i64, i64)| Ok::<_, Thrown>(a + b));
        let err = run(add.invoke(vec![json!("one"), json!(2)])).unwrap_err();
        assert_eq!(err.descriptor().unwrap().name, "TypeError");
    }

    #[test]
    fn test_unencodable_result_is_serialization_error() {
        let keyed = BoundFunction::typed(|_: Vec<Value>| {
            let mut map = BTreeMap::new();
            map.insert((1, 2), "tuple keys are not valid JSON keys");
            Ok::<_, Thrown>(map)
        });
        let err = run(keyed.invoke(vec![])).unwrap_err();
        assert_eq!(err.descriptor().unwrap().name, "SerializationError");
    }

    #[test]
    fn test_string_errors_become_error_descriptors() {
        let failing = BoundFunction::typed(|_: Vec<Value>| Err::<Value, _>("bad input"));
        let err = run(failing.invoke(vec![])).unwrap_err();
        assert_eq!(err, Thrown::Error(ErrorDescriptor::error("bad input")));
    }

    #[test]
    fn test_async_function() {
        let double = BoundFunction::typed_async(|(n,): (i64,)| async move { Ok::<_, Thrown>(n * 2) });
        assert!(double.is_async());
        assert_eq!(run(double.invoke(vec![json!(21)])), Ok(json!(42)));
    }

    #[test]
    fn test_table_replace_and_remove() {
        let table = FunctionTable::new();
        assert!(table.insert("a", BoundFunction::from_fn(|_| Ok(json!(1)))).is_none());
        assert!(table.insert("a", BoundFunction::from_fn(|_| Ok(json!(2)))).is_some());
        assert_eq!(table.len(), 1);
        assert_eq!(run(table.get("a").unwrap().invoke(vec![])), Ok(json!(2)));
        assert!(table.remove("a").is_some());
        assert!(table.is_empty());
        assert!(table.get("a").is_none());
    }
}
