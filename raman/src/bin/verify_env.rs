//! Checks that the runtime environment can run the analysis: image codecs,
//! the rayon pool and a writable temp directory. Exits with 1 on any failure.

use std::io::Cursor;
use std::process::ExitCode;

use anyhow::{ensure, Context, Result};
use image::{GrayImage, ImageFormat, Luma};
use rayon::prelude::*;

fn codec_round_trip(format: ImageFormat) -> Result<()> {
    let image = GrayImage::from_fn(32, 24, |x, y| Luma([((x * 8 + y * 4) % 256) as u8]));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, format)
        .with_context(|| format!("encoding {format:?}"))?;
    let decoded = image::load_from_memory_with_format(bytes.get_ref(), format)
        .with_context(|| format!("decoding {format:?}"))?
        .to_luma8();
    ensure!(
        decoded.dimensions() == image.dimensions(),
        "{format:?} round trip changed dimensions to {:?}",
        decoded.dimensions()
    );
    Ok(())
}

fn thread_pool() -> Result<()> {
    let threads = rayon::current_num_threads();
    ensure!(threads > 0, "rayon reports no threads");
    let sum: u64 = (0..10_000u64).into_par_iter().sum();
    ensure!(sum == 49_995_000, "parallel sum returned {sum}");
    Ok(())
}

fn temp_dir_writable() -> Result<()> {
    let path = std::env::temp_dir().join(format!("raman-verify-{}.tmp", std::process::id()));
    std::fs::write(&path, b"ok").with_context(|| format!("writing {}", path.display()))?;
    std::fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
    Ok(())
}

fn main() -> ExitCode {
    println!("raman {} environment check", env!("CARGO_PKG_VERSION"));

    let checks: [(&str, fn() -> Result<()>); 4] = [
        ("png codec", || codec_round_trip(ImageFormat::Png)),
        ("jpeg codec", || codec_round_trip(ImageFormat::Jpeg)),
        ("rayon pool", thread_pool),
        ("temp directory", temp_dir_writable),
    ];

    let mut failed = 0;
    for (name, check) in checks {
        match check() {
            Ok(()) => println!("[ok]   {name}"),
            Err(err) => {
                failed += 1;
                println!("[fail] {name}: {err:#}");
            }
        }
    }

    if failed == 0 {
        println!("all checks passed");
        ExitCode::SUCCESS
    } else {
        println!("{failed} check(s) failed");
        ExitCode::FAILURE
    }
}
