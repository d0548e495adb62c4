use tracing::info;

use host_platform::settings::{AccountKind, AccountLogin, Credentials, InstallSettings};

/// Group-managed service accounts end with this character.
pub const MANAGED_ACCOUNT_MARKER: char = '$';

/// Virtual service accounts are named `NT SERVICE\<service name>`.
pub const VIRTUAL_ACCOUNT_PREFIX: &str = "NT SERVICE\\";

pub const LOCAL_SERVICE_ACCOUNT: &str = "NT AUTHORITY\\LocalService";
pub const NETWORK_SERVICE_ACCOUNT: &str = "NT AUTHORITY\\NetworkService";

/// Translate the configured credentials into the fields the native installer
/// expects.
///
/// Managed and virtual accounts carry no password; `have_login_info` tells the
/// installer not to ask for one.
pub fn resolve_login(settings: &InstallSettings) -> AccountLogin {
    match settings.credentials() {
        Credentials::LocalSystem => AccountLogin::default(),
        Credentials::LocalService => AccountLogin {
            kind: AccountKind::LocalService,
            username: Some(LOCAL_SERVICE_ACCOUNT.to_string()),
            ..AccountLogin::default()
        },
        Credentials::NetworkService => AccountLogin {
            kind: AccountKind::NetworkService,
            username: Some(NETWORK_SERVICE_ACCOUNT.to_string()),
            ..AccountLogin::default()
        },
        Credentials::User { username, password } => {
            if is_managed_account(username) {
                info!("installing as gMSA {}", username);
                passwordless(username)
            } else if is_virtual_account(username, settings) {
                info!("installing as virtual service account {}", username);
                passwordless(username)
            } else {
                AccountLogin {
                    kind: AccountKind::User,
                    username: Some(username.clone()),
                    password: Some(password.clone()),
                    have_login_info: false,
                }
            }
        }
        Credentials::VirtualOrManagedAccount { username } => passwordless(username),
    }
}

fn is_managed_account(username: &str) -> bool {
    username.ends_with(MANAGED_ACCOUNT_MARKER)
}

fn is_virtual_account(username: &str, settings: &InstallSettings) -> bool {
    username
        .strip_prefix(VIRTUAL_ACCOUNT_PREFIX)
        .is_some_and(|rest| rest == settings.name().as_str())
}

fn passwordless(username: &str) -> AccountLogin {
    AccountLogin {
        kind: AccountKind::User,
        username: Some(username.to_string()),
        password: None,
        have_login_info: true,
    }
}
