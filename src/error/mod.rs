mod tagvault;

pub use tagvault::TagVaultError;
