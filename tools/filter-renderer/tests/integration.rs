/// Integration tests for the filter renderer.
///
/// These render short clips through the full model and verify:
/// 1. WAV shape and length
/// 2. The cutoff register audibly darkens the signal
/// 3. Output is deterministic across runs
use std::process::Command;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "filter-renderer", "--"]);
    cmd
}

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(name)
}

#[test]
fn test_cli_renders_wav() {
    let output_path = temp_path("filter_integration_cli.wav");
    let _ = std::fs::remove_file(&output_path);

    let status = cargo_bin()
        .args(["-s", "saw", "-f", "220", "-d", "0.3", "-o"])
        .arg(&output_path)
        .status()
        .expect("failed to run filter-renderer");

    assert!(status.success(), "filter-renderer exited with error");
    assert!(output_path.exists(), "WAV file not created");

    let reader = hound::WavReader::open(&output_path).expect("invalid WAV file");
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.spec().sample_rate, 44100);
    assert_eq!(reader.spec().bits_per_sample, 24);
    assert_eq!(reader.len(), 13230);

    std::fs::remove_file(&output_path).ok();
}

#[test]
fn test_cutoff_darkens_the_signal() {
    let open_path = temp_path("filter_fc_open.wav");
    let closed_path = temp_path("filter_fc_closed.wav");

    for (path, fc) in [(&open_path, "2047"), (&closed_path, "96")] {
        let _ = std::fs::remove_file(path);
        let status = cargo_bin()
            .args(["-s", "saw", "-f", "220", "-c", fc, "-d", "0.3", "-o"])
            .arg(path)
            .status()
            .expect("failed to run filter-renderer");
        assert!(status.success());
    }

    // Brightness proxy: RMS of the first difference relative to signal RMS.
    // A closed lowpass strips the saw's upper harmonics, so its normalized
    // difference energy must come out well below the open filter's.
    let open = brightness(&read_samples(&open_path));
    let closed = brightness(&read_samples(&closed_path));
    assert!(
        closed < open * 0.7,
        "closed filter should be darker: closed={closed:.4} open={open:.4}"
    );

    std::fs::remove_file(&open_path).ok();
    std::fs::remove_file(&closed_path).ok();
}

#[test]
fn test_deterministic_output() {
    let path1 = temp_path("filter_det_1.wav");
    let path2 = temp_path("filter_det_2.wav");

    for path in [&path1, &path2] {
        let _ = std::fs::remove_file(path);
        let status = cargo_bin()
            .args(["-s", "pulse", "-f", "110", "-c", "700", "-r", "9", "-d", "0.2", "-o"])
            .arg(path)
            .status()
            .expect("failed to run filter-renderer");
        assert!(status.success());
    }

    assert_eq!(
        read_samples(&path1),
        read_samples(&path2),
        "two renders with identical settings should be identical"
    );

    std::fs::remove_file(&path1).ok();
    std::fs::remove_file(&path2).ok();
}

fn read_samples(path: &std::path::Path) -> Vec<i32> {
    let mut reader = hound::WavReader::open(path).expect("failed to open WAV");
    reader.samples::<i32>().map(|s| s.unwrap()).collect()
}

fn brightness(samples: &[i32]) -> f64 {
    // Skip the onset transient.
    let tail = &samples[samples.len() / 4..];
    let rms: f64 = (tail.iter().map(|&s| (s as f64).powi(2)).sum::<f64>() / tail.len() as f64).sqrt();
    let diff_rms: f64 = (tail
        .windows(2)
        .map(|w| ((w[1] - w[0]) as f64).powi(2))
        .sum::<f64>()
        / (tail.len() - 1) as f64)
        .sqrt();
    diff_rms / rms.max(1.0)
}
