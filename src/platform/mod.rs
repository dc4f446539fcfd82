//! Platform backends for the bridges
//!
//! - **ios**: the host shim, reporting back through exported entry points
//! - **unsupported**: every other target; nothing is available
//! - **mock**: deterministic backends for tests, behind the `mock` feature

use crate::config::BridgeConfig;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(target_os = "ios")]
pub mod ios;

#[cfg(not(target_os = "ios"))]
pub mod unsupported;

/// Identity provider for the current target
#[cfg(target_os = "ios")]
pub type PlatformSignInProvider = ios::IosSignInProvider;

/// Identity provider for the current target
#[cfg(not(target_os = "ios"))]
pub type PlatformSignInProvider = unsupported::UnsupportedSignInProvider;

/// Browser engine for the current target
#[cfg(target_os = "ios")]
pub type PlatformWebEngine = ios::IosWebEngine;

/// Browser engine for the current target
#[cfg(not(target_os = "ios"))]
pub type PlatformWebEngine = unsupported::UnsupportedEngine;

/// Build the identity provider for the current target
#[allow(unused_variables)]
pub fn sign_in_provider(config: &BridgeConfig) -> PlatformSignInProvider {
    #[cfg(target_os = "ios")]
    {
        ios::IosSignInProvider::new(config.sign_in.minimum_os_version)
    }
    #[cfg(not(target_os = "ios"))]
    {
        unsupported::UnsupportedSignInProvider
    }
}

/// Build the browser engine for the current target
pub fn web_engine() -> PlatformWebEngine {
    PlatformWebEngine::default()
}
