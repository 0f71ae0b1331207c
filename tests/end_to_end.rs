// End-to-end scenarios exercising both storage engines through the
// public API.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use hicdex::cooler::{self, FileOptions, SumValue};
use hicdex::hic::{self, WriterOptions};
use hicdex::transformers::CoarsenPixels;
use hicdex::{BinTable, File, HicdexError, Reference, ThinPixel, WeightKind, Weights};

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

fn reference() -> Reference {
    Reference::from_chrom_sizes([("chr1", 5_000u32), ("chr2", 3_000), ("chr3", 1_200)]).unwrap()
}

fn bin_table(bin_size: u32) -> BinTable {
    BinTable::new(reference(), bin_size).unwrap()
}

// A reproducible sparse upper-triangular matrix.
fn random_pixels(seed: u64) -> Vec<ThinPixel<i32>> {
    let bins = bin_table(100);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pixels = Vec::new();
    for i in 0..bins.size() {
        for j in i..bins.size() {
            if rng.gen_bool(0.25) {
                pixels.push(ThinPixel::new(i, j, rng.gen_range(1..100)));
            }
        }
    }
    pixels
}

fn write_cooler(dir: &TempDir, name: &str, pixels: &[ThinPixel<i32>]) -> String {
    let uri = dir.path().join(name).display().to_string();
    let mut file = cooler::File::create::<i32>(&uri, bin_table(100), FileOptions::default()).unwrap();
    // append in several batches to exercise the cross-batch protocol
    for chunk in pixels.chunks(500) {
        file.append_pixels(chunk.iter().copied(), true).unwrap();
    }
    file.close().unwrap();
    uri
}

fn write_hic(dir: &TempDir, name: &str, pixels: &[ThinPixel<i32>]) -> String {
    let path = dir.path().join(name);
    let mut writer = hic::Writer::new(
        &path,
        reference(),
        vec![100],
        WriterOptions::default(),
    )
    .unwrap();
    writer.add_pixels(pixels.iter().copied()).unwrap();
    writer.serialize().unwrap();
    path.display().to_string()
}

#[test]
fn cooler_round_trip_preserves_stream_and_statistics() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let pixels = random_pixels(42);
    let uri = write_cooler(&dir, "test.cool", &pixels);

    let file = cooler::File::open(&uri).unwrap();
    assert_eq!(file.attributes().nnz, pixels.len() as u64);
    let sum: i64 = pixels.iter().map(|p| i64::from(p.count)).sum();
    assert_eq!(file.attributes().sum, Some(SumValue::Int(sum)));

    // the index and the pixel table agree
    file.validate_index().unwrap();

    let streamed = file.fetch().unwrap().read_all::<i32>().unwrap();
    assert_eq!(streamed, pixels);

    // aggregate of the genome-wide stream matches the sum attribute
    let total: i64 = streamed.iter().map(|p| i64::from(p.count)).sum();
    assert_eq!(total, sum);
}

#[test]
fn rectangle_query_matches_in_memory_filter() {
    let dir = TempDir::new().unwrap();
    let pixels = random_pixels(7);
    let uri = write_cooler(&dir, "test.cool", &pixels);
    let file = File::open(&uri).unwrap();

    let bins = bin_table(100);
    // chr1:1000-2500 -> bins 10..25; chr2:0-1100 -> bins 50..61
    let expected: Vec<_> = pixels
        .iter()
        .copied()
        .filter(|p| (10..25).contains(&p.bin1_id) && (50..61).contains(&p.bin2_id))
        .collect();
    assert_eq!(bins.size(), 92);

    let got = file
        .fetch2("chr1:1000-2500", "chr2:0-1100")
        .unwrap()
        .read_all::<i32>()
        .unwrap();
    assert_eq!(got, expected);
}

#[test]
fn hic_and_cooler_agree_on_every_query_shape() {
    let dir = TempDir::new().unwrap();
    let pixels = random_pixels(1234);
    let cool = File::open(&write_cooler(&dir, "test.cool", &pixels)).unwrap();
    let hic = File::open(&write_hic(&dir, "test.hic", &pixels)).unwrap();

    let a = cool.fetch().unwrap().read_all::<i32>().unwrap();
    let b = hic.fetch().unwrap().read_all::<i32>().unwrap();
    assert_eq!(a, b);

    for (q1, q2) in [
        ("chr1:0-5000", "chr1:0-5000"),
        ("chr1:1200-3400", "chr1:2000-4800"),
        ("chr1", "chr2"),
        ("chr2:500-2500", "chr3"),
        ("chr1:700-700", "chr1"),
    ] {
        let a = cool.fetch2(q1, q2).unwrap().read_all::<i32>().unwrap();
        let b = hic.fetch2(q1, q2).unwrap().read_all::<i32>().unwrap();
        assert_eq!(a, b, "query ({q1}, {q2})");
    }
}

#[test]
fn zoomified_resolution_equals_directly_coarsened_matrix() {
    let dir = TempDir::new().unwrap();
    let pixels = random_pixels(99);
    let base_uri = write_cooler(&dir, "base.cool", &pixels);

    let mcool_path = dir.path().join("out.mcool");
    let mcool = cooler::zoomify(&base_uri, &mcool_path, &[200, 400], false).unwrap();

    // build the 200 bp matrix independently and compare pixel-for-pixel
    let coarse: Vec<_> = CoarsenPixels::new(
        pixels.iter().copied().map(Ok),
        std::sync::Arc::new(bin_table(100)),
        2,
    )
    .unwrap()
    .collect::<hicdex::Result<Vec<_>>>()
    .unwrap();

    let level = mcool.open_resolution(200).unwrap();
    assert_eq!(level.fetch().unwrap().read_all::<i32>().unwrap(), coarse);
    level.validate_index().unwrap();
}

#[test]
fn balancing_round_trips_through_the_selector() {
    let dir = TempDir::new().unwrap();
    let pixels = random_pixels(5);
    let uri = write_cooler(&dir, "test.cool", &pixels);
    let file = cooler::File::open_rw(&uri).unwrap();

    let nbins = file.bins().size() as usize;
    let values: Vec<f64> = (0..nbins).map(|i| 0.5 + (i % 7) as f64 / 4.0).collect();
    file.write_weights(
        "weight",
        &Weights::new(values.clone(), WeightKind::Multiplicative),
        false,
    )
    .unwrap();

    let balanced = file
        .fetch_normalized("chr1", "chr1", "weight")
        .unwrap()
        .read_all::<f64>()
        .unwrap();

    // dividing by the same weights reproduces the raw counts
    let divisive = Weights::new(values, WeightKind::Divisive);
    let raw: Vec<_> = pixels
        .iter()
        .filter(|p| p.bin1_id < 50 && p.bin2_id < 50)
        .collect();
    assert_eq!(balanced.len(), raw.len());
    for (b, r) in balanced.iter().zip(raw) {
        let inverted = divisive.balance_thin(*b).unwrap();
        let expected = f64::from(r.count);
        assert!(
            (inverted.count - expected).abs() <= 1e-9 * expected,
            "({}, {})",
            b.bin1_id,
            b.bin2_id
        );
    }
}

#[test]
fn weights_survive_bit_for_bit_and_reject_bad_shapes() {
    let dir = TempDir::new().unwrap();
    let uri = write_cooler(&dir, "test.cool", &random_pixels(3));
    let file = cooler::File::open_rw(&uri).unwrap();
    let nbins = file.bins().size() as usize;

    let values: Vec<f64> = (0..nbins).map(|i| (i as f64).sqrt() + 0.125).collect();
    file.write_weights("SCALE", &Weights::new(values.clone(), WeightKind::Divisive), false)
        .unwrap();
    drop(file);

    let file = cooler::File::open(&uri).unwrap();
    let read = file.weights("SCALE").unwrap();
    assert_eq!(read.values(), &values[..]);
    assert_eq!(read.kind(), WeightKind::Divisive);
    drop(file);

    let file = cooler::File::open_rw(&uri).unwrap();
    let short = Weights::new(vec![1.0; nbins - 1], WeightKind::Divisive);
    assert!(matches!(
        file.write_weights("short", &short, false),
        Err(HicdexError::ShapeMismatch { .. })
    ));
}

#[test]
fn merging_two_hic_copies_doubles_every_count() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let pixels = random_pixels(2024);
    let a = write_hic(&dir, "a.hic", &pixels);
    let b = write_hic(&dir, "b.hic", &pixels);
    let out = dir.path().join("merged.hic");

    hic::merge_hics(
        &[std::path::Path::new(&a), std::path::Path::new(&b)],
        &out,
        100,
        WriterOptions::default(),
    )
    .unwrap();

    let merged = hic::File::open(&out).unwrap();
    let got = merged.fetch(100).unwrap().read_all::<i32>().unwrap();
    assert_eq!(got.len(), pixels.len());
    for (m, p) in got.iter().zip(&pixels) {
        assert_eq!(m.coords(), p.coords());
        assert_eq!(m.count, 2 * p.count);
    }
}
