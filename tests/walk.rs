use ironflume::{EntryKind, FakeRemoteIO, RemoteIO, RemoteTreeWalker};
use regex::Regex;

fn sample_tree() -> FakeRemoteIO {
    let mut remote = FakeRemoteIO::new();
    remote.add_file("/data/2021/trips_202101.csv", "a,1\n");
    remote.add_file("/data/2021/trips_202102.csv", "b,2\n");
    remote.add_file("/data/2021/notes.txt", "scratch\n");
    remote.add_file("/data/2022/trips_202201.csv", "c,3\n");
    remote.add_file("/xdata/trips_209901.csv", "d,4\n");
    remote.add_dir("/archive");
    remote
}

#[test]
fn walk_visits_every_directory_in_preorder() -> anyhow::Result<()> {
    let mut remote = sample_tree();
    let mut walker = RemoteTreeWalker::new(&mut remote);
    let listings = walker.walk()?;

    let paths: Vec<&str> = listings.iter().map(|l| l.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["/", "/archive", "/data", "/data/2021", "/data/2022", "/xdata"]
    );
    assert_eq!(
        listings[3].files,
        vec!["notes.txt", "trips_202101.csv", "trips_202102.csv"]
    );
    // the cursor ends up back where the traversal started
    assert_eq!(remote.cursor(), "/");
    Ok(())
}

#[test]
fn get_files_selects_by_prefix_and_sorts() -> anyhow::Result<()> {
    let mut remote = sample_tree();
    let mut walker = RemoteTreeWalker::new(&mut remote);
    let files = walker.get_files(&Regex::new("^(?:/data)")?, &Regex::new("^(?:trips_)")?)?;
    assert_eq!(
        files,
        vec![
            "/data/2021/trips_202101.csv",
            "/data/2021/trips_202102.csv",
            "/data/2022/trips_202201.csv",
        ]
    );
    Ok(())
}

#[test]
fn unanchored_directory_patterns_match_anywhere() -> anyhow::Result<()> {
    let mut remote = sample_tree();
    let mut walker = RemoteTreeWalker::new(&mut remote);
    let files = walker.get_files(&Regex::new("/data")?, &Regex::new("^(?:trips_)")?)?;
    // "/xdata" contains "/data", so anchoring is the caller's decision
    assert!(files.contains(&"/xdata/trips_209901.csv".to_string()));
    Ok(())
}

#[test]
fn nested_directories_are_reached() -> anyhow::Result<()> {
    let mut remote = FakeRemoteIO::new();
    remote.add_file("/data/a/b/c/trips_000001.csv", "x,1\n");
    let mut walker = RemoteTreeWalker::new(&mut remote);
    let files = walker.get_files(&Regex::new("^(?:/data)")?, &Regex::new("^(?:trips_)")?)?;
    assert_eq!(files, vec!["/data/a/b/c/trips_000001.csv"]);
    assert_eq!(remote.cursor(), "/");
    Ok(())
}

#[test]
fn listings_distinguish_directories_from_files() -> anyhow::Result<()> {
    let mut remote = sample_tree();
    remote.cwd("/data/2021")?;
    let entries = remote.list()?;
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.kind == EntryKind::File));

    remote.cwd("/")?;
    let dirs: Vec<String> = remote
        .list()?
        .into_iter()
        .filter(|e| e.kind == EntryKind::Dir)
        .map(|e| e.name)
        .collect();
    assert_eq!(dirs, vec!["archive", "data", "xdata"]);
    Ok(())
}

#[test]
fn fake_remote_cursor_moves_like_a_real_connection() -> anyhow::Result<()> {
    let mut remote = sample_tree();
    remote.cwd("data")?;
    assert_eq!(remote.cursor(), "/data");
    remote.cwd("2021")?;
    assert_eq!(remote.cursor(), "/data/2021");
    assert_eq!(remote.read_text("trips_202101.csv")?, "a,1\n");

    remote.cwd("..")?;
    assert_eq!(remote.cursor(), "/data");
    remote.cwd("/xdata")?;
    assert_eq!(remote.cursor(), "/xdata");

    assert!(remote.cwd("/nope").is_err());
    assert!(remote.read_text("/data/missing.csv").is_err());
    Ok(())
}
