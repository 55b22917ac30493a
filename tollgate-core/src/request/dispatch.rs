//! [`Dispatch`]: the `(base, extra)` pair routers shift components
//! between as a request descends the router tree.

use crate::path::PathKey;

/// `base ++ extra` always reconstructs the original request pathname.
/// `base` never carries a wildcard flag; `extra` never carries one
/// either — wildcard-ness lives only in the router configuration that
/// matched, not in the dispatch value itself.
#[derive(Debug, Clone)]
pub struct Dispatch {
 base: PathKey,
 extra: PathKey,
}

impl Dispatch {
 /// Builds the initial dispatch for a freshly parsed request: an empty
 /// base and the full pathname as `extra`.
 pub fn fresh(pathname: PathKey) -> Self {
 Dispatch {
 base: PathKey::root(),
 extra: pathname.with_wildcard(false),
 }
 }

 pub fn base(&self) -> &PathKey {
 &self.base
 }

 pub fn extra(&self) -> &PathKey {
 &self.extra
 }

 /// Shifts `matched`'s components from `extra` onto `base`, leaving
 /// `remainder` as the new `extra`. This is exactly what `PathRouter`
 /// does with a `PathMap::find_with_fallback` result: `matched` comes
 /// from `FindResult::matched_key`, `remainder` from
 /// `FindResult::remainder`.
 pub fn shift(&self, matched: &PathKey, remainder: &PathKey) -> Dispatch {
 debug_assert!(!matched.wildcard());
 debug_assert!(!remainder.wildcard());
 Dispatch {
 base: self.base.join(&matched.with_wildcard(false)),
 extra: remainder.clone(),
 }
 }
}

#[cfg(test)]
mod tests {
 use super::*;

 #[test]
 fn shift_preserves_total_length() {
 let d = Dispatch::fresh(PathKey::new(["a", "b", "c"], false));
 let shifted = d.shift(&PathKey::new(["a", "b"], false), &PathKey::new(["c"], false));
 assert_eq!(shifted.base().len() + shifted.extra().len(), 3);
 assert_eq!(shifted.base().join(shifted.extra()).components(), &[
 std::sync::Arc::<str>::from("a"),
 std::sync::Arc::<str>::from("b"),
 std::sync::Arc::<str>::from("c"),
 ]);
 }

 #[test]
 fn shifted_dispatch_never_has_wildcard_base_or_extra() {
 let d = Dispatch::fresh(PathKey::new(["a", "b"], false));
 let shifted = d.shift(&PathKey::new(["a"], false), &PathKey::new(["b"], false));
 assert!(!shifted.base().wildcard());
 assert!(!shifted.extra().wildcard());
 }
}
