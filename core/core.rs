pub mod config;
pub mod deploy;
pub mod digest;
pub mod error;
pub mod gather;
pub mod policy;
pub mod tree;

pub use config::{Config, LineCountMode};
pub use deploy::{DeployFailure, DeployReceipt, Deployer, RetryPolicy, deploy_with_retry};
pub use digest::{DigestBudget, DigestDocument, DigestReport, escape_markup, run_digest};
pub use error::{AppError, Result};
pub use gather::{FileEntry, GatheredFiles, gather_files};
pub use policy::{Classification, Exclusion, PathClassifier, get_builtin_policy};
pub use tree::{FileTree, TreeNode, assemble_tree, build_file_tree};
