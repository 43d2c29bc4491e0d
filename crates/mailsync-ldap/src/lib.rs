//! LDAP directory source
//!
//! Implements the `DirectorySource` contract for LDAP/Active Directory.

pub mod config;
pub mod source;

pub use config::LdapConfig;
pub use source::LdapDirectory;
