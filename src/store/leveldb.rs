use std::cell::RefCell;
use std::path::Path;

use anyhow::{Result, anyhow, ensure};
use log::info;
use rusty_leveldb::{DB, Options, WriteBatch};

use super::{Store, Transaction};

pub struct LevelDbStore {
    // DB::write 需要 &mut，而事务只持有共享引用
    db: RefCell<DB>,
}

impl LevelDbStore {
    /// 创建一个新的数据库，已存在时报错
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        // rusty-leveldb 在检查 error_if_exists 之前就会创建目录，只能自己检查
        ensure!(!path.exists(), "leveldb 已存在: {}", path.display());
        info!("打开 leveldb: {}", path.display());

        let options = Options { create_if_missing: true, ..Options::default() };
        let db = DB::open(path, options)
            .map_err(|e| anyhow!("打开 leveldb 失败: {}: {}", path.display(), e))?;
        Ok(Self { db: RefCell::new(db) })
    }
}

impl Store for LevelDbStore {
    type Txn<'a> = LevelDbTransaction<'a>;

    fn begin(&self) -> Result<Self::Txn<'_>> {
        Ok(LevelDbTransaction { db: &self.db, batch: WriteBatch::default() })
    }
}

/// 以 WriteBatch 实现的事务，提交时原子写入
pub struct LevelDbTransaction<'a> {
    db: &'a RefCell<DB>,
    batch: WriteBatch,
}

impl Transaction for LevelDbTransaction<'_> {
    fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.batch.put(key.as_bytes(), value);
        Ok(())
    }

    fn commit(self) -> Result<()> {
        self.db
            .borrow_mut()
            .write(self.batch, true)
            .map_err(|e| anyhow!("写入 leveldb 失败: {}", e))
    }
}
