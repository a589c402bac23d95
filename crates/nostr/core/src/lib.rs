mod identity;
mod nip06;

pub use identity::{
    ENV_IDENTITY_MNEMONIC_PATH, NostrIdentity, identity_mnemonic_path, load_identity_from_path,
    load_or_create_identity, regenerate_identity,
};
pub use nip06::{Keypair, derive_keypair, derive_keypair_with_account};
