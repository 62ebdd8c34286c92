use std::path::Path;

use anyhow::Result;
use indicatif::{ParallelProgressIterator, ProgressBar};
use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::config::{ConvertOptions, Opts};
use crate::datum::{Datum, pack_pair};
use crate::loader::load_pair;
use crate::manifest::{ManifestEntry, read_manifest, shuffle_entries};
use crate::store::{Backend, LevelDbStore, LmdbStore, Store};
use crate::utils::pb_style;
use crate::writer::{BatchWriter, make_key};

/// 一次转换的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertStats {
    /// 清单中的记录数量
    pub total: usize,
    /// 写入数据库的记录数量
    pub written: usize,
    /// 因读取失败或尺寸不一致而跳过的记录数量
    pub skipped: usize,
    /// 提交的事务数量
    pub commits: usize,
}

/// 读取一对图片并打包
pub fn read_entry(root: &Path, entry: &ManifestEntry, options: &ConvertOptions) -> Result<Datum> {
    let (img1, img2) = load_pair(root, &entry.image1, &entry.image2, options.resize, options.color)?;
    pack_pair(&img1, &img2, entry.label, &options.pack)
}

/// 将清单中的图片对写入数据库
///
/// 每一批图片并行解码，然后按清单顺序依次写入，读取失败的图片对会被跳过。
/// check_size 检查失败或数据库写入失败时立即返回错误，只有已提交的批次会保留。
pub fn convert<S: Store>(
    store: &S,
    root: &Path,
    entries: &[ManifestEntry],
    options: &ConvertOptions,
) -> Result<ConvertStats> {
    let pb = ProgressBar::new(entries.len() as u64).with_style(pb_style());
    let mut writer = BatchWriter::new(store, options.batch_size, options.check_size);
    let mut skipped = 0;

    for chunk in entries.chunks(options.batch_size.get()) {
        let datums = chunk
            .par_iter()
            .progress_with(pb.clone())
            .map(|entry| read_entry(root, entry, options))
            .collect::<Vec<_>>();

        for (entry, datum) in chunk.iter().zip(datums) {
            match datum {
                Ok(datum) => writer.put(&make_key(entry.index, &entry.image1), &datum)?,
                Err(e) => {
                    warn!("跳过第 {} 组图片 {} {}: {:#}", entry.index, entry.image1, entry.image2, e);
                    skipped += 1;
                }
            }
        }
    }

    let stats = writer.finish()?;
    pb.finish_and_clear();

    Ok(ConvertStats { total: entries.len(), written: stats.records, skipped, commits: stats.commits })
}

/// 按命令行参数执行转换
pub fn run(opts: &Opts) -> Result<ConvertStats> {
    let mut entries = read_manifest(&opts.manifest)?;
    if opts.shuffle {
        info!("打乱顺序");
        let mut rng = match opts.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        shuffle_entries(&mut entries, &mut rng);
    }
    info!("共 {} 组图片", entries.len());

    if !opts.encode_type.is_empty() {
        if !opts.encoded {
            info!("指定了 encode_type，视为 encoded=true");
        }
        match opts.encode_type() {
            Some(encoding) => info!("编码格式: {:?}", encoding),
            None => warn!("未知的编码格式: {}", opts.encode_type),
        }
    }
    if opts.encoding_requested() {
        info!("编码存储尚未启用，按原始像素保存");
    }

    let options = ConvertOptions::from(opts);
    let stats = match opts.backend {
        Backend::Lmdb => {
            let store = LmdbStore::create(&opts.db_path)?;
            convert(&store, &opts.root_folder, &entries, &options)?
        }
        Backend::LevelDb => {
            let store = LevelDbStore::create(&opts.db_path)?;
            convert(&store, &opts.root_folder, &entries, &options)?
        }
    };

    info!("转换完成，写入 {} 条记录，跳过 {} 条", stats.written, stats.skipped);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::path::PathBuf;

    use image::{GrayImage, Luma};
    use tempfile::TempDir;

    use super::*;
    use crate::loader::{ColorMode, Resize};
    use crate::manifest::parse_manifest;
    use crate::writer::tests::MemoryStore;

    fn write_gray(dir: &TempDir, name: &str, width: u32, height: u32, value: u8) {
        GrayImage::from_pixel(width, height, Luma([value])).save(dir.path().join(name)).unwrap();
    }

    fn root_of(dir: &TempDir) -> PathBuf {
        PathBuf::from(format!("{}/", dir.path().display()))
    }

    fn gray_options(batch_size: usize) -> ConvertOptions {
        let batch_size = NonZeroUsize::new(batch_size).unwrap();
        ConvertOptions { color: ColorMode::Gray, batch_size, ..ConvertOptions::default() }
    }

    #[test]
    fn test_skips_unreadable_pairs() {
        let dir = TempDir::new().unwrap();
        write_gray(&dir, "a.png", 2, 2, 1);
        write_gray(&dir, "b.png", 2, 2, 2);
        let entries = parse_manifest("a.png b.png 0\nx.png y.png 1\nb.png a.png 2\n");

        let store = MemoryStore::default();
        let stats = convert(&store, &root_of(&dir), &entries, &gray_options(1000)).unwrap();
        assert_eq!(stats, ConvertStats { total: 3, written: 2, skipped: 1, commits: 1 });

        let data = store.data.borrow();
        assert_eq!(data.keys().cloned().collect::<Vec<_>>(), vec!["00000000_a.png", "00000002_b.png"]);
        let datum = Datum::from_bytes(&data["00000002_b.png"]).unwrap();
        assert_eq!(datum.label, 2);
        assert_eq!(datum.data, vec![2, 2, 2, 2, 1, 1, 1, 1]);
    }

    #[test]
    fn test_skips_mismatched_sizes() {
        let dir = TempDir::new().unwrap();
        write_gray(&dir, "a.png", 2, 2, 1);
        write_gray(&dir, "b.png", 3, 2, 2);
        let entries = parse_manifest("a.png b.png 0\na.png a.png 1\n");

        let store = MemoryStore::default();
        let stats = convert(&store, &root_of(&dir), &entries, &gray_options(1000)).unwrap();
        assert_eq!((stats.written, stats.skipped), (1, 1));

        // 统一缩放后尺寸一致
        let store = MemoryStore::default();
        let options = ConvertOptions { resize: Resize::new(4, 4), ..gray_options(1000) };
        let stats = convert(&store, &root_of(&dir), &entries, &options).unwrap();
        assert_eq!((stats.written, stats.skipped), (2, 0));
    }

    #[test]
    fn test_check_size_aborts_run() {
        let dir = TempDir::new().unwrap();
        write_gray(&dir, "a.png", 2, 2, 1);
        write_gray(&dir, "b.png", 3, 3, 2);
        let entries = parse_manifest("a.png a.png 0\na.png a.png 1\nb.png b.png 2\na.png a.png 3\n");

        let store = MemoryStore::default();
        let options = ConvertOptions { check_size: true, ..gray_options(1) };
        assert!(convert(&store, &root_of(&dir), &entries, &options).is_err());
        assert_eq!(store.data.borrow().len(), 2);
        assert_eq!(store.commits.borrow().len(), 2);
    }

    #[test]
    fn test_keys_use_original_index_after_shuffle() {
        let dir = TempDir::new().unwrap();
        write_gray(&dir, "a.png", 2, 2, 1);
        let content = (0..10).map(|i| format!("a.png a.png {i}\n")).collect::<String>();
        let mut entries = parse_manifest(&content);
        shuffle_entries(&mut entries, &mut StdRng::seed_from_u64(1));

        let store = MemoryStore::default();
        convert(&store, &root_of(&dir), &entries, &gray_options(3)).unwrap();
        assert_eq!(store.commits.borrow().as_slice(), &[3, 3, 3, 1]);
        for (key, value) in store.data.borrow().iter() {
            let index: i32 = key[..8].parse().unwrap();
            assert_eq!(Datum::from_bytes(value).unwrap().label, index);
        }
    }
}
