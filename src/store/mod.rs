mod leveldb;
mod lmdb;

use anyhow::Result;
use clap::ValueEnum;
pub use leveldb::*;
pub use lmdb::*;

/// 支持的数据库类型
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Lmdb,
    #[value(name = "leveldb")]
    LevelDb,
}

/// 一个新建的键值数据库
pub trait Store {
    type Txn<'a>: Transaction
    where
        Self: 'a;

    /// 开启一个写事务
    fn begin(&self) -> Result<Self::Txn<'_>>;
}

/// 写事务，调用 commit 后写入才会生效，未提交就 drop 的事务会被丢弃
pub trait Transaction {
    fn put(&mut self, key: &str, value: &[u8]) -> Result<()>;

    fn commit(self) -> Result<()>;
}
