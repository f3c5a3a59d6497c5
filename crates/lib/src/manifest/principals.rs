use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityPrincipals {
  pub groups: Vec<Group>,
  pub users: Vec<User>,
}

impl SecurityPrincipals {
  pub fn is_empty(&self) -> bool {
    self.groups.is_empty() && self.users.is_empty()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
  pub name: String,
  pub membership: Vec<GroupMember>,
}

/// A member of a group. Canonical order is domain users, then domain groups, then system groups.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum GroupMember {
  DomainUser { name: String },
  DomainGroup { name: String },
  SystemGroup { name: String },
}

impl GroupMember {
  pub fn kind_rank(&self) -> u8 {
    match self {
      GroupMember::DomainUser { .. } => 0,
      GroupMember::DomainGroup { .. } => 1,
      GroupMember::SystemGroup { .. } => 2,
    }
  }

  pub fn name(&self) -> &str {
    match self {
      GroupMember::DomainUser { name } | GroupMember::DomainGroup { name } | GroupMember::SystemGroup { name } => name,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccountType {
  #[default]
  LocalUser,
  DomainUser,
  NetworkService,
  LocalService,
  LocalSystem,
  ManagedServiceAccount,
}

impl AccountType {
  /// Whether the account is resolved by a directory service and carries an account name.
  pub fn is_directory_account(self) -> bool {
    matches!(self, AccountType::DomainUser | AccountType::ManagedServiceAccount)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
  pub name: String,
  pub account_type: AccountType,
  pub account_name: Option<String>,
  pub password: Option<String>,
  pub password_encrypted: Option<String>,
  pub member_of: Vec<UserMembership>,
}

/// A group a user belongs to. Canonical order is application groups, then system groups.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum UserMembership {
  Group { name_ref: String },
  SystemGroup { name: String },
}

impl UserMembership {
  pub fn kind_rank(&self) -> u8 {
    match self {
      UserMembership::Group { .. } => 0,
      UserMembership::SystemGroup { .. } => 1,
    }
  }

  pub fn name(&self) -> &str {
    match self {
      UserMembership::Group { name_ref } => name_ref,
      UserMembership::SystemGroup { name } => name,
    }
  }
}
