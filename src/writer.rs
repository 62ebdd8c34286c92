use std::num::NonZeroUsize;

use anyhow::{Result, bail};
use log::info;

use crate::datum::Datum;
use crate::store::{Store, Transaction};

/// 生成记录的键：8 位补零的原始序号 + "_" + 图片 1 的路径
pub fn make_key(index: usize, image1: &str) -> String {
    format!("{:08}_{}", index, image1)
}

/// 写入统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// 成功写入的记录数量
    pub records: usize,
    /// 提交的事务数量
    pub commits: usize,
}

/// 按批次提交的写入器
///
/// 每写入 batch_size 条记录提交一次事务，剩余不足一批的记录在 finish 时提交。
/// 写入器被 drop 而没有调用 finish 时，未提交的记录会被丢弃。
pub struct BatchWriter<'a, S: Store + 'a> {
    store: &'a S,
    txn: Option<S::Txn<'a>>,
    batch_size: usize,
    /// 当前事务中未提交的记录数量
    pending: usize,
    /// 开启 check_size 时，第一条记录的数据大小
    expected_size: Option<usize>,
    check_size: bool,
    stats: WriteStats,
}

impl<'a, S: Store + 'a> BatchWriter<'a, S> {
    pub fn new(store: &'a S, batch_size: NonZeroUsize, check_size: bool) -> Self {
        Self {
            store,
            txn: None,
            batch_size: batch_size.get(),
            pending: 0,
            expected_size: None,
            check_size,
            stats: WriteStats::default(),
        }
    }

    pub fn stats(&self) -> WriteStats {
        self.stats
    }

    /// 写入一条记录
    ///
    /// 开启 check_size 后，数据大小与第一条记录不同会直接返回错误，不会写入
    pub fn put(&mut self, key: &str, datum: &Datum) -> Result<()> {
        if self.check_size {
            match self.expected_size {
                None => self.expected_size = Some(datum.data_size()),
                Some(expected) if datum.data.len() != expected => {
                    bail!("记录 {} 的数据大小不正确: {} != {}", key, datum.data.len(), expected);
                }
                Some(_) => {}
            }
        }

        let value = datum.to_bytes();
        let txn = match self.txn.take() {
            Some(txn) => txn,
            None => self.store.begin()?,
        };
        let txn = self.txn.insert(txn);
        txn.put(key, &value)?;
        self.pending += 1;
        self.stats.records += 1;

        if self.pending == self.batch_size {
            self.commit()?;
            info!("已处理 {} 个文件", self.stats.records);
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if let Some(txn) = self.txn.take() {
            txn.commit()?;
            self.stats.commits += 1;
        }
        self.pending = 0;
        Ok(())
    }

    /// 提交最后一批记录
    pub fn finish(mut self) -> Result<WriteStats> {
        if self.pending > 0 {
            self.commit()?;
            info!("已处理 {} 个文件", self.stats.records);
        }
        Ok(self.stats)
    }
}
