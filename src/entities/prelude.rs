pub use super::err_epoch::Entity as ErrEpoch;
pub use super::fin_epoch::Entity as FinEpoch;
pub use super::his_bet::Entity as HisBet;
pub use super::his_claim::Entity as HisClaim;
pub use super::multi_claim::Entity as MultiClaim;
pub use super::real_bet::Entity as RealBet;
pub use super::round::Entity as Round;
