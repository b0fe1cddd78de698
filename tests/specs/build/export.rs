//! Export build specs

use crate::prelude::*;
use std::path::PathBuf;

#[test]
fn export_is_packaged_as_a_zip() {
    let ws = Workspace::new();
    let daemon = ws.start();

    let reply = daemon.submit("export", SESSION, Some(game("Jump")));
    let job = daemon.wait_job(reply["job"]["id"].as_str().unwrap());

    assert_eq!(job["status"], "succeeded", "job: {job}");
    let zip = PathBuf::from(job["result_path"].as_str().unwrap());
    assert!(zip.is_file(), "missing {}", zip.display());
    assert_eq!(zip.parent().unwrap(), ws.storage_path().join("gdevelop/exports"));
    let name = zip.file_name().unwrap().to_string_lossy().into_owned();
    assert!(
        name.starts_with("sess-1-") && name.ends_with(".zip"),
        "zip name: {name}"
    );
}

#[test]
fn disabled_exports_are_refused() {
    let ws = Workspace::new().config("\n[features]\nexport_generation = false\n");
    let daemon = ws.start();

    let reply = daemon.submit("export", SESSION, Some(game("Jump")));

    assert_eq!(reply["type"], "Error");
    assert_eq!(reply["code"], "kind_disabled");
}
