//! Channel applications.

pub mod gov_hub;
pub mod token_hub;
pub mod validator_set;

use crate::app::CrossChainApp;
use crate::state::AppKind;

/// Application serving channels registered with `kind`.
pub fn app_for(kind: AppKind) -> &'static dyn CrossChainApp {
    match kind {
        AppKind::ValidatorSet => &validator_set::ValidatorSetApp,
        AppKind::TokenHub => &token_hub::TokenHubApp,
        AppKind::GovHub => &gov_hub::GovHubApp,
        AppKind::Slash => &validator_set::slash::SlashApp,
    }
}
