//! Option Resolver
//!
//! Merges caller options over client defaults and applies the suspense and
//! error-boundary overrides. Pure: equal inputs give structurally equal
//! output, so a memo over it only wakes dependents on a real change.

use std::time::Duration;

use crate::config::DefaultQueryOptions;
use crate::query::{
    EffectiveOptions, ErrorBoundaryPolicy, QueryKey, QueryOptions, DEFAULT_CACHE_TIME,
    DEFAULT_RETRY,
};

/// Stale time injected under suspense when none is configured.
pub const SUSPENSE_STALE_TIME: Duration = Duration::from_millis(1000);

/// Resolve the options the engine should run with.
///
/// Rules, in order:
///
/// 1. Caller options win over client defaults. An unset error-boundary
///    policy follows `suspense`.
/// 2. Results are optimistic.
/// 3. Suspense without a stale time gets [`SUSPENSE_STALE_TIME`], so the
///    query is not fetched again right after the suspended mount resolves.
/// 4. With suspense or error escalation on and the boundary not reset,
///    retry-on-mount is off.
pub fn resolve_options<T, E>(
    raw: &QueryOptions<T, E>,
    defaults: &DefaultQueryOptions,
    boundary_is_reset: bool,
) -> EffectiveOptions<T, E>
where
    T: Clone,
{
    let suspense = raw.suspense.or(defaults.suspense).unwrap_or(false);
    let use_error_boundary = raw
        .use_error_boundary
        .clone()
        .or_else(|| defaults.use_error_boundary.map(ErrorBoundaryPolicy::from))
        .unwrap_or_else(|| ErrorBoundaryPolicy::from(suspense));

    let stale_time = match raw.stale_time.or(defaults.stale_time) {
        Some(stale_time) => stale_time,
        None if suspense => SUSPENSE_STALE_TIME,
        None => Duration::ZERO,
    };

    let mut retry_on_mount = raw.retry_on_mount.or(defaults.retry_on_mount).unwrap_or(true);
    if (suspense || use_error_boundary.is_enabled()) && !boundary_is_reset {
        retry_on_mount = false;
    }

    EffectiveOptions {
        query_key: raw.query_key.clone().unwrap_or_else(|| QueryKey::new([])),
        query_fn: raw.query_fn.clone(),
        select: raw.select.clone(),
        initial_data: raw.initial_data.clone(),
        stale_time,
        cache_time: raw.cache_time.or(defaults.cache_time).unwrap_or(DEFAULT_CACHE_TIME),
        retry: raw.retry.or(defaults.retry).unwrap_or(DEFAULT_RETRY),
        retry_delay: raw.retry_delay.or(defaults.retry_delay),
        enabled: raw.enabled.or(defaults.enabled).unwrap_or(true),
        suspense,
        use_error_boundary,
        notify_on_change_props: raw
            .notify_on_change_props
            .clone()
            .or_else(|| defaults.notify_on_change_props.clone()),
        retry_on_mount,
        refetch_on_mount: raw.refetch_on_mount.or(defaults.refetch_on_mount).unwrap_or(true),
        optimistic_results: true,
    }
}
