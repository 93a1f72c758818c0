use crate::{
    error::{EngineError, EngineResult},
    models::{Contract, ContractStatus},
};

pub fn can_mutate_participants(status: ContractStatus) -> bool {
    status != ContractStatus::Signed
}

pub fn ensure_participants_mutable(contract: &Contract) -> EngineResult<()> {
    if can_mutate_participants(contract.status) {
        Ok(())
    } else {
        Err(EngineError::Lifecycle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_signed_contracts_are_frozen() {
        let statuses = [
            ContractStatus::Draft,
            ContractStatus::NeedsRevision,
            ContractStatus::AwaitingSignatures,
            ContractStatus::Signed,
            ContractStatus::ExpiringSoon,
            ContractStatus::Expired,
        ];

        for status in statuses {
            assert_eq!(
                can_mutate_participants(status),
                status != ContractStatus::Signed,
                "{status}"
            );
        }
    }
}
