use indicatif::ProgressStyle;

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template("{elapsed_precise} {wide_bar} {pos:>7}/{len:7} {per_sec:>12} {msg}")
        .expect("invalid progress bar template")
}
