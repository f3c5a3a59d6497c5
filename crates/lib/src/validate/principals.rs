use super::rules::Presence;
use super::{CaseSensitivity, DuplicateDetector, Rules, ValidationError};
use crate::consts::PRINCIPAL_NAME_FORBIDDEN_CHAR;
use crate::manifest::{AccountType, GroupMember, SecurityPrincipals, User, UserMembership};

/// Validate users and groups declared by an application.
pub fn validate_principals(rules: &Rules, principals: &SecurityPrincipals) -> Result<(), ValidationError> {
  let groups = detector(rules, "Group");
  for group in &principals.groups {
    principal_name(rules, "Group", &group.name)?;
    groups.add(&group.name)?;

    for member in &group.membership {
      let at = rules.at("Group/Membership", "Name");
      let name = rules.not_empty(&at, Some(member.name()))?;
      match member {
        GroupMember::DomainUser { .. } | GroupMember::DomainGroup { .. } => rules.account_name(&at, name)?,
        GroupMember::SystemGroup { .. } => {}
      }
    }
  }

  let users = detector(rules, "User");
  for user in &principals.users {
    principal_name(rules, "User", &user.name)?;
    users.add(&user.name)?;
    validate_account(rules, user)?;

    let memberships = detector(rules, "User/MemberOf");
    for membership in &user.member_of {
      memberships.add(membership.name())?;
      if let UserMembership::Group { name_ref } = membership {
        let declared = principals
          .groups
          .iter()
          .any(|g| g.name.eq_ignore_ascii_case(name_ref));
        if !declared {
          return Err(ValidationError::InvalidReference {
            at: rules.at("User/MemberOf", "NameRef"),
            value: name_ref.clone(),
            target: "group",
          });
        }
      }
    }
  }

  Ok(())
}

fn detector(rules: &Rules, element: &str) -> DuplicateDetector {
  let detector = DuplicateDetector::new(element, "Name", CaseSensitivity::Insensitive);
  match rules.file() {
    Some(file) => detector.in_file(file),
    None => detector,
  }
}

fn principal_name(rules: &Rules, element: &str, name: &str) -> Result<(), ValidationError> {
  let at = rules.at(element, "Name");
  let name = rules.not_empty(&at, Some(name))?;
  if name.contains(PRINCIPAL_NAME_FORBIDDEN_CHAR) {
    return Err(ValidationError::InvalidName {
      at,
      value: name.to_string(),
      reason: "'|' is not allowed in principal names",
    });
  }
  Ok(())
}

fn validate_account(rules: &Rules, user: &User) -> Result<(), ValidationError> {
  let account_type = format!("{:?}", user.account_type);
  let discriminator = ("AccountType", account_type.as_str());
  let name_at = rules.at("User", "AccountName");
  let password_at = rules.at("User", "Password");

  let (name_presence, password_presence) = match user.account_type {
    AccountType::DomainUser => (Presence::Required, Presence::Required),
    AccountType::ManagedServiceAccount => (Presence::Required, Presence::Forbidden),
    _ => (Presence::Forbidden, Presence::Forbidden),
  };

  rules.exclusive(&name_at, user.account_name.as_deref(), name_presence, discriminator)?;
  rules.password_exclusive(&password_at, user.password.as_deref(), password_presence, discriminator)?;

  if let (true, Some(account_name)) = (user.account_type.is_directory_account(), user.account_name.as_deref()) {
    rules.account_name(&name_at, account_name)?;
  }

  rules.boolean(&rules.at("User", "PasswordEncrypted"), user.password_encrypted.as_deref())?;
  Ok(())
}
