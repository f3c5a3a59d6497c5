//! Property tests for canonicalization and parameter resolution.

use imagebuilder_lib::ErrorKind;
use imagebuilder_lib::canonical::Canonical;
use imagebuilder_lib::manifest::{Group, GroupMember, ManifestParameter, SecurityPrincipals, User, UserMembership};
use imagebuilder_lib::params::resolve;
use imagebuilder_lib::util::hash::checksum_of;
use proptest::prelude::*;

fn member() -> impl Strategy<Value = GroupMember> {
  let name = "[a-z]{1,6}";
  prop_oneof![
    name.prop_map(|name| GroupMember::DomainUser { name }),
    name.prop_map(|name| GroupMember::DomainGroup { name }),
    name.prop_map(|name| GroupMember::SystemGroup { name }),
  ]
}

fn membership() -> impl Strategy<Value = UserMembership> {
  prop_oneof![
    "[a-z]{1,6}".prop_map(|name_ref| UserMembership::Group { name_ref }),
    "[a-z]{1,6}".prop_map(|name| UserMembership::SystemGroup { name }),
  ]
}

fn group() -> impl Strategy<Value = Group> {
  ("[A-Z][a-z]{0,5}", prop::collection::vec(member(), 0..6)).prop_map(|(name, membership)| Group { name, membership })
}

fn user() -> impl Strategy<Value = User> {
  ("[A-Z][a-z]{0,5}", prop::collection::vec(membership(), 0..4)).prop_map(|(name, member_of)| User {
    name,
    member_of,
    ..Default::default()
  })
}

fn principals() -> impl Strategy<Value = SecurityPrincipals> {
  (prop::collection::vec(group(), 0..5), prop::collection::vec(user(), 0..5))
    .prop_map(|(groups, users)| SecurityPrincipals { groups, users })
}

/// Principals plus a copy whose every collection is reshuffled.
fn principals_and_shuffle() -> impl Strategy<Value = (SecurityPrincipals, SecurityPrincipals)> {
  principals().prop_flat_map(|original| {
    let groups = original
      .groups
      .clone()
      .into_iter()
      .map(|g| {
        let name = g.name.clone();
        Just(g.membership).prop_shuffle().prop_map(move |membership| Group {
          name: name.clone(),
          membership,
        })
      })
      .collect::<Vec<_>>()
      .prop_shuffle();
    let users = Just(original.users.clone()).prop_shuffle();
    (Just(original), groups, users).prop_map(|(original, groups, users)| (original, SecurityPrincipals { groups, users }))
  })
}

fn declared_names() -> impl Strategy<Value = Vec<String>> {
  prop::collection::btree_set("[A-Z][a-z]{0,5}", 1..6).prop_map(|names| names.into_iter().collect())
}

fn declare(names: &[String]) -> Vec<ManifestParameter> {
  names
    .iter()
    .map(|name| ManifestParameter {
      name: name.clone(),
      default_value: "default".into(),
    })
    .collect()
}

proptest! {
  #[test]
  fn canonicalize_is_idempotent(principals in principals()) {
    let once = principals.canonicalize();
    let twice = once.clone().canonicalize();
    prop_assert_eq!(once, twice);
  }

  #[test]
  fn canonicalize_ignores_input_order((original, shuffled) in principals_and_shuffle()) {
    prop_assert_eq!(original.clone().canonicalize(), shuffled.clone().canonicalize());
    prop_assert_eq!(checksum_of(&original).unwrap(), checksum_of(&shuffled).unwrap());
  }

  #[test]
  fn declared_overrides_always_resolve(names in declared_names(), mask in prop::collection::vec(any::<bool>(), 6)) {
    let overrides: Vec<(String, String)> = names
      .iter()
      .zip(&mask)
      .filter(|(_, keep)| **keep)
      .map(|(name, _)| (name.clone(), "override".to_string()))
      .collect();

    let resolved = resolve(&overrides, &declare(&names)).unwrap();
    prop_assert_eq!(resolved.len(), names.len());
    for (name, _) in &overrides {
      prop_assert_eq!(resolved.get(name), Some("override"));
    }
  }

  #[test]
  fn one_undeclared_key_always_fails(names in declared_names(), extra in "[a-z]{1,6}_undeclared") {
    let mut overrides: Vec<(String, String)> = names.iter().map(|n| (n.clone(), "v".to_string())).collect();
    overrides.push((extra, "v".to_string()));

    let err = resolve(&overrides, &declare(&names)).unwrap_err();
    prop_assert_eq!(err.kind(), ErrorKind::UndeclaredParameter);
  }

  #[test]
  fn repeated_key_always_fails(names in declared_names(), index in any::<prop::sample::Index>()) {
    let repeated = index.get(&names).clone();
    let overrides = vec![(repeated.clone(), "a".to_string()), (repeated.to_lowercase(), "b".to_string())];

    let err = resolve(&overrides, &declare(&names)).unwrap_err();
    prop_assert_eq!(err.kind(), ErrorKind::DuplicateParameter);
  }
}
