//! `workshop-auth` — identity, profiles and authorization.
//!
//! - user accounts and their one-to-one profiles (event-sourced aggregates);
//! - JWT claims and HS256 token validation;
//! - role → permission policy and the command-boundary authorization check.
//!
//! Nothing here performs storage or HTTP.

pub mod authorize;
pub mod claims;
pub mod permissions;
pub mod principal;
pub mod profile;
pub mod roles;
pub mod user;

pub use authorize::{AuthzError, CommandAuthorization, authorize};
pub use claims::{Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError, validate_claims};
pub use permissions::Permission;
pub use principal::{Principal, TenantMembership};
pub use profile::{
    ActivateProfile, ChangeRole, ContactUpdated, DeactivateProfile, PROFILE_EXISTS, ProfileActivated,
    ProfileCommand, ProfileDeactivated, ProfileEvent, ProfileProvisioned, ProvisionProfile,
    RoleChanged, UpdateContact, UserProfile,
};
pub use roles::{ProfileRole, Role, permissions_for_roles};
pub use user::{full_name, RegisterUser, UpdateUser, UserAccount, UserCommand, UserEvent, UserRegistered, UserUpdated};
