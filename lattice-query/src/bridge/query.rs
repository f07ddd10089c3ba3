//! Query Construction Overloads
//!
//! [`create_query`] accepts anything convertible into [`QueryOptions`]: a bare
//! key, a key with a fetch function, a key with options, or all three.

use std::sync::Arc;

use lattice_core::reactive::Memo;

use super::base_query::create_base_query;
use super::tracked::QueryResult;
use crate::boundary::QueryErrorResetBoundary;
use crate::query::{QueryClient, QueryFn, QueryKey, QueryOptions};

impl<T, E> From<QueryKey> for QueryOptions<T, E> {
    fn from(key: QueryKey) -> Self {
        QueryOptions::new().key(key)
    }
}

impl<T, E> From<(QueryKey, QueryFn<T, E>)> for QueryOptions<T, E> {
    fn from((key, query_fn): (QueryKey, QueryFn<T, E>)) -> Self {
        QueryOptions::new().key(key).query_fn(query_fn)
    }
}

impl<T, E> From<(QueryKey, QueryOptions<T, E>)> for QueryOptions<T, E> {
    fn from((key, options): (QueryKey, QueryOptions<T, E>)) -> Self {
        options.key(key)
    }
}

impl<T, E> From<(QueryKey, QueryFn<T, E>, QueryOptions<T, E>)> for QueryOptions<T, E> {
    fn from((key, query_fn, options): (QueryKey, QueryFn<T, E>, QueryOptions<T, E>)) -> Self {
        options.key(key).query_fn(query_fn)
    }
}

/// Bridge a query into the current scope.
///
/// `args` is read reactively and normalized into [`QueryOptions`]; the
/// bridge uses the innermost provided [`QueryErrorResetBoundary`].
///
/// ```rust,ignore
/// let todos = create_query(client, move || {
///     (QueryKey::from("todos"), fetch_todos.clone())
/// });
///
/// Effect::new(move || println!("{:?}", todos.data()));
/// ```
pub fn create_query<T, E, A, F>(client: Arc<dyn QueryClient<T, E>>, args: F) -> QueryResult<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
    A: Into<QueryOptions<T, E>>,
    F: Fn() -> A + Send + Sync + 'static,
{
    let parsed: Memo<QueryOptions<T, E>> = Memo::new(move || args().into());
    create_base_query(client, move || parsed.get(), QueryErrorResetBoundary::current())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Retry;

    type Options = QueryOptions<String, String>;

    #[test]
    fn bare_key_becomes_options() {
        let options: Options = QueryKey::from("todos").into();
        assert_eq!(options.query_key, Some(QueryKey::from("todos")));
        assert!(options.query_fn.is_none());
    }

    #[test]
    fn key_overrides_options_key() {
        let query_fn: QueryFn<String, String> = QueryFn::new(|_| async { Ok("x".to_string()) });
        let options: Options = (
            QueryKey::from("todos"),
            query_fn.clone(),
            Options::new().key("ignored").retry(Retry::Never),
        )
            .into();

        assert_eq!(options.query_key, Some(QueryKey::from("todos")));
        assert_eq!(options.query_fn, Some(query_fn));
        assert_eq!(options.retry, Some(Retry::Never));
    }

    #[test]
    fn key_with_options_keeps_options() {
        let options: Options = (QueryKey::from("todos"), Options::new().suspense(true)).into();
        assert_eq!(options.query_key, Some(QueryKey::from("todos")));
        assert_eq!(options.suspense, Some(true));
    }
}
