use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions, RwTxn, WithTls};
use log::info;

use super::{Store, Transaction};

pub struct LmdbStore {
    /// lmdb env，此处使用了 Thread Local Storage
    env: Env<WithTls>,
    db: Database<Str, Bytes>,
}

impl LmdbStore {
    /// 创建一个新的数据库，目录已存在时报错
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        fs::create_dir(path).with_context(|| format!("创建 lmdb 目录失败: {}", path.display()))?;
        info!("打开 lmdb: {}", path.display());

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(1 << 40) // 稀疏文件，不会真正占用 1TiB
                .open(path)
                .with_context(|| format!("打开 lmdb 失败: {}", path.display()))?
        };
        let mut txn = env.write_txn()?;
        let db = env.create_database::<Str, Bytes>(&mut txn, None)?;
        txn.commit()?;
        Ok(Self { env, db })
    }
}

impl Store for LmdbStore {
    type Txn<'a> = LmdbTransaction<'a>;

    fn begin(&self) -> Result<Self::Txn<'_>> {
        let txn = self.env.write_txn()?;
        Ok(LmdbTransaction { txn, db: self.db })
    }
}

pub struct LmdbTransaction<'a> {
    txn: RwTxn<'a>,
    db: Database<Str, Bytes>,
}

impl Transaction for LmdbTransaction<'_> {
    fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.db.put(&mut self.txn, key, value)?;
        Ok(())
    }

    fn commit(self) -> Result<()> {
        self.txn.commit()?;
        Ok(())
    }
}
