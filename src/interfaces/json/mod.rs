pub mod merchant_rpc;
