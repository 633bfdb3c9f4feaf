//! [`Chain`]-related definitions.

use crate::define_kind;

define_kind! {
    #[doc = "Distributed ledger a payment is settled on."]
    enum Chain {
        #[doc = "Solana ledger."]
        Solana = 1,
    }
}
