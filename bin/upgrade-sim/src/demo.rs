//! The demo token contracts the simulator upgrades between.

use borsh::{BorshDeserialize, BorshSerialize};
use strata_upgrade_types::{ContractId, ContractState, PubKey};
use strata_upgrade_verify::{UpgradeSpecError, UpgradeSpecification};

pub(crate) const TOKEN_V1: &str = "token-v1";
pub(crate) const TOKEN_V2: &str = "token-v2";

/// Decimal places introduced by `token-v2`.
const V2_DECIMALS: u8 = 2;

/// Payload of a `token-v1` state: a whole-unit balance.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub(crate) struct TokenV1 {
    pub balance: u64,
}

/// Payload of a `token-v2` state: balance in minor units.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub(crate) struct TokenV2 {
    pub minor_units: u64,
    pub decimals: u8,
}

pub(crate) fn token_v1_state(participants: Vec<PubKey>, balance: u64) -> ContractState {
    let data = borsh::to_vec(&TokenV1 { balance }).expect("demo: encode token-v1");
    ContractState::new(TOKEN_V1.into(), participants, data)
}

/// Re-denominates a `token-v1` balance into `token-v2` minor units.
#[derive(Debug, Default)]
pub(crate) struct TokenV2Upgrade;

impl UpgradeSpecification for TokenV2Upgrade {
    fn contract_id(&self) -> ContractId {
        TOKEN_V2.into()
    }

    fn legacy_contract(&self) -> ContractId {
        TOKEN_V1.into()
    }

    fn upgrade(&self, state: &ContractState) -> Result<ContractState, UpgradeSpecError> {
        let v1 = TokenV1::try_from_slice(state.data())
            .map_err(|e| UpgradeSpecError::InvalidStateData(e.to_string()))?;

        let minor_units = v1
            .balance
            .checked_mul(10u64.pow(V2_DECIMALS as u32))
            .ok_or_else(|| UpgradeSpecError::InvalidStateData("balance overflows".to_owned()))?;
        let v2 = TokenV2 {
            minor_units,
            decimals: V2_DECIMALS,
        };
        let data =
            borsh::to_vec(&v2).map_err(|e| UpgradeSpecError::InvalidStateData(e.to_string()))?;

        Ok(ContractState::new(
            self.contract_id(),
            state.participants().to_vec(),
            data,
        ))
    }
}
