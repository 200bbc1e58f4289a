pub mod nfs;
