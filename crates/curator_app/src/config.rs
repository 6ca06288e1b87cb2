use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use curator_engine::JobConfig;

/// Read a RON job file. `work_dir` overrides the directory named in the file.
pub(crate) fn load_job(path: &Path, work_dir: Option<PathBuf>) -> Result<JobConfig> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading job file {}", path.display()))?;
    let mut job: JobConfig =
        ron::from_str(&content).with_context(|| format!("parsing job file {}", path.display()))?;
    if let Some(dir) = work_dir {
        job.work_dir = dir;
    }
    validate(&job)?;
    Ok(job)
}

fn validate(job: &JobConfig) -> Result<()> {
    if job.feeds.is_empty() {
        bail!("job has no feeds");
    }
    if job.curation.max_items == 0 {
        bail!("curation.max_items must be at least 1");
    }
    if !(1..=100).contains(&job.images.recompress_quality) {
        bail!("images.recompress_quality must be between 1 and 100");
    }
    if job.output_filename.trim().is_empty() {
        bail!("output_filename is empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::load_job;
    use curator_core::{ImagePolicy, TitleSource};
    use curator_engine::TlsPolicy;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn configs_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../configs")
    }

    #[test]
    fn every_bundled_job_loads() {
        let mut count = 0;
        for entry in fs::read_dir(configs_dir()).unwrap() {
            let path = entry.unwrap().path();
            if path.extension().is_some_and(|ext| ext == "ron") {
                let job = load_job(&path, None).unwrap_or_else(|err| panic!("{}: {err:#}", path.display()));
                assert!(!job.feeds.is_empty());
                count += 1;
            }
        }
        assert!(count >= 5);
    }

    #[test]
    fn ecoagro_job_merges_two_labelled_feeds() {
        let job = load_job(&configs_dir().join("g1_ecoagro.ron"), None).unwrap();
        let labels: Vec<&TitleSource> = job.feeds.iter().map(|feed| &feed.title).collect();
        assert_eq!(
            labels,
            vec![
                &TitleSource::Label("Agronegócios".into()),
                &TitleSource::Label("Economia".into())
            ]
        );
        assert!(job.feeds[1].url.ends_with("/g1/economia/"));
        assert!(job.feeds.iter().all(|feed| feed.tls == TlsPolicy::AcceptInvalidCerts));
        assert_eq!(job.curation.max_age_hours, Some(168));
        assert_eq!(job.curation.min_description_chars, 50);
        assert_eq!(job.images.recompress_quality, 50);
    }

    #[test]
    fn globorural_job_uses_short_window_and_low_quality() {
        let job = load_job(&configs_dir().join("g1_globorural.ron"), None).unwrap();
        assert_eq!(job.feeds[0].url, "https://pox.globo.com/rss/globorural/");
        assert_eq!(job.curation.max_age_hours, Some(72));
        assert_eq!(job.curation.min_description_chars, 50);
        assert_eq!(job.images.recompress_quality, 20);
    }

    #[test]
    fn exame_job_scans_descriptions_without_age_or_length_rules() {
        let job = load_job(&configs_dir().join("exame_invest.ron"), None).unwrap();
        assert_eq!(job.feeds[0].title, TitleSource::Category);
        assert!(job.curation.scan_description);
        assert_eq!(job.curation.max_age_hours, None);
        assert_eq!(job.curation.min_description_chars, 0);
        assert_eq!(job.images.recompress_quality, 20);
    }

    #[test]
    fn investing_job_relaxes_tls_for_images_only() {
        let job = load_job(&configs_dir().join("investing.ron"), None).unwrap();
        assert_eq!(job.feeds[0].title, TitleSource::Label("Geral".into()));
        assert_eq!(job.feeds[0].tls, TlsPolicy::Verify);
        assert_eq!(job.images.tls, TlsPolicy::AcceptInvalidCerts);
        assert_eq!(
            job.curation.image_policy,
            ImagePolicy::Placeholder {
                path: "./assets/placeholder.png".into()
            }
        );
        assert!(job.curation.scan_description);
        assert!(job.curation.allows_extension("png"));
        assert_eq!(job.curation.max_age_hours, None);
    }

    #[test]
    fn cruzeiro_job_runs_unfiltered_into_its_own_file() {
        let job = load_job(&configs_dir().join("cruzeiro_do_sul.ron"), None).unwrap();
        assert!(!job.block_list.enabled);
        assert_eq!(job.presentation.max_description_chars, Some(300));
        assert!(job.output_path().ends_with("new_feed.xml"));
    }

    #[test]
    fn minimal_job_takes_defaults_and_work_dir_override() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("job.ron");
        fs::write(&path, r#"(feeds: [(url: "https://example.com/rss")])"#).unwrap();

        let job = load_job(&path, Some(temp.path().to_path_buf())).unwrap();
        assert_eq!(job.curation.max_items, 11);
        assert_eq!(job.output_path(), temp.path().join("feed.xml"));
        assert_eq!(job.feeds[0].title, TitleSource::Original);
    }

    #[test]
    fn job_without_feeds_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.ron");
        fs::write(&path, "()").unwrap();
        assert!(load_job(&path, None).is_err());
    }
}
