#[cfg(any(
    feature = "compression-gzip",
    feature = "compression-zstd",
    feature = "compression-bzip2",
    feature = "compression-xz"
))]
mod compression_tests {
    use anyhow::Result;
    use ironbrc::Runner;
    use ironbrc::io::compression::{auto_detect_reader, codec_for_path, codecs};
    use ironbrc::testing::{MeasurementsBuilder, assert_same_result, write_measurements};
    use std::io::Read;

    fn plain_and_compressed(name: &str) -> Result<()> {
        let dir = tempfile::tempdir()?;
        let builder = MeasurementsBuilder::new().rows(3_000).seed(11);
        let plain = builder.write_to(dir.path(), "measurements.txt")?;
        let packed = builder.write_to(dir.path(), name)?;
        assert_ne!(std::fs::read(&plain)?, std::fs::read(&packed)?);

        let runner = Runner::parallel(Some(2)).with_chunk_size(512);
        let expected = runner.run_path(&plain)?;
        let actual = runner.run_path(&packed)?;
        assert_same_result(&actual, &expected);
        Ok(())
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn gzip_matches_plain() -> Result<()> {
        plain_and_compressed("measurements.txt.gz")
    }

    #[cfg(feature = "compression-zstd")]
    #[test]
    fn zstd_matches_plain() -> Result<()> {
        plain_and_compressed("measurements.txt.zst")
    }

    #[cfg(feature = "compression-bzip2")]
    #[test]
    fn bzip2_matches_plain() -> Result<()> {
        plain_and_compressed("measurements.txt.bz2")
    }

    #[cfg(feature = "compression-xz")]
    #[test]
    fn xz_matches_plain() -> Result<()> {
        plain_and_compressed("measurements.txt.xz")
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn magic_bytes_detect_renamed_gzip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let data = b"Paris;10.0\nParis;20.0\nOslo;-5.5\n";
        let gz = write_measurements(dir.path().join("sample.gz"), data)?;
        let renamed = dir.path().join("sample.bin");
        std::fs::rename(&gz, &renamed)?;

        let result = Runner::sequential().run_path(&renamed)?;
        assert_eq!(result.to_string(), "{Oslo=-5.5/-5.5/-5.5, Paris=10.0/15.0/20.0}");
        Ok(())
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        for codec in codecs() {
            let ext = codec.extensions()[0].to_uppercase();
            let found = codec_for_path(format!("DATA{ext}")).map(|c| c.name());
            assert_eq!(found, Some(codec.name()));
        }
        assert!(codec_for_path("measurements.txt").is_none());
    }

    #[test]
    fn plain_input_passes_through() -> Result<()> {
        let data = b"no codec here;1.0\n".to_vec();
        let mut reader = auto_detect_reader(std::io::Cursor::new(data.clone()), "in.txt")?;
        let mut out = Vec::new();
        reader.read_to_end(&mut out)?;
        assert_eq!(out, data);
        Ok(())
    }
}
