//! Integration tests for write-fault redirection on read-only mappings.

#![cfg(target_os = "linux")]

mod common;

use common::{DEMO, demo_workspace, interceptor, patterned_file};
use pageshadow_core::interceptor::TrapState;
use pageshadow_core::paging::PAGE_SIZE;
use pageshadow_core::redirect::{PageRedirector, RemapRebinder};
use pageshadow_core::{FaultInterceptor, MappedRegion};

#[test]
fn write_is_visible_in_memory_but_not_on_disk() {
    let (_dir, ws) = demo_workspace();
    let path = ws.file_path(0);

    let mut region = MappedRegion::open_watched(&path, interceptor()).unwrap();
    region.write_at(15, b"xxx").unwrap();

    assert_eq!(&region.as_bytes()[15..18], b"xxx");
    assert_eq!(&region.as_bytes()[..15], &DEMO[..15]);
    assert_eq!(&region.as_bytes()[18..], &DEMO[18..]);
    assert_eq!(std::fs::read(&path).unwrap(), DEMO);
}

#[test]
fn later_writes_to_a_redirected_page_stick() {
    let (_dir, ws) = demo_workspace();
    let path = ws.file_path(1);

    let mut region = MappedRegion::open_watched(&path, interceptor()).unwrap();
    region.write_at(0, b"A").unwrap();
    region.write_at(1, b"B").unwrap();
    region.write_at(0, b"C").unwrap();

    assert_eq!(&region.as_bytes()[..2], b"CB");
    assert_eq!(std::fs::read(&path).unwrap(), DEMO);
}

#[test]
fn write_spanning_a_page_boundary_redirects_both_pages() {
    let (_dir, ws) = demo_workspace();
    let path = patterned_file(&ws, "two_pages", PAGE_SIZE * 2);
    let before = std::fs::read(&path).unwrap();
    let interceptor = interceptor();

    let mut region = MappedRegion::open_watched(&path, interceptor).unwrap();
    assert_eq!(region.pages(), 2);
    region.write_at(PAGE_SIZE as u64 - 2, b"wxyz").unwrap();

    let bytes = region.as_bytes();
    assert_eq!(&bytes[PAGE_SIZE - 2..PAGE_SIZE + 2], b"wxyz");
    assert_eq!(&bytes[..PAGE_SIZE - 2], &before[..PAGE_SIZE - 2]);
    assert_eq!(&bytes[PAGE_SIZE + 2..], &before[PAGE_SIZE + 2..]);
    assert_eq!(std::fs::read(&path).unwrap(), before);
    assert!(interceptor.stats().redirects >= 2);
}

#[test]
fn out_of_bounds_write_changes_nothing() {
    let (_dir, ws) = demo_workspace();
    let mut region = MappedRegion::open_watched(ws.file_path(0), interceptor()).unwrap();

    let err = region.write_at(36, b"xxx").unwrap_err();
    assert_eq!(err.code(), "E003");
    assert_eq!(region.as_bytes(), DEMO);
}

#[test]
fn unwatched_region_refuses_writes() {
    let (_dir, ws) = demo_workspace();
    let mut region = MappedRegion::open(ws.file_path(0)).unwrap();

    assert_eq!(region.write_at(0, b"x").unwrap_err().code(), "E103");
    assert_eq!(region.as_bytes(), DEMO);
}

#[test]
fn second_install_returns_the_same_interceptor() {
    let first = interceptor();
    let second =
        FaultInterceptor::install(PageRedirector::new(Box::new(RemapRebinder::new()))).unwrap();

    assert!(std::ptr::eq(first, second));
    assert!(std::ptr::eq(FaultInterceptor::installed().unwrap(), first));
    assert_eq!(first.rebinder_name(), "remap");
}

#[test]
fn trap_is_idle_between_faults() {
    let (_dir, ws) = demo_workspace();
    let interceptor = interceptor();
    let mut region = MappedRegion::open_watched(ws.file_path(0), interceptor).unwrap();

    region.write_at(2, b"q").unwrap();
    assert_eq!(interceptor.trap_state(), TrapState::Idle);
}

#[test]
fn concurrent_writers_on_separate_regions() {
    let (_dir, ws) = demo_workspace();
    let paths: Vec<_> = (0..4)
        .map(|i| patterned_file(&ws, &format!("region{}", i), PAGE_SIZE * 3))
        .collect();
    let interceptor = interceptor();

    std::thread::scope(|scope| {
        for (i, path) in paths.iter().enumerate() {
            scope.spawn(move || {
                let mut region = MappedRegion::open_watched(path, interceptor).unwrap();
                for page in 0..3 {
                    let offset = (page * PAGE_SIZE + i) as u64;
                    region.write_at(offset, &[0xEE]).unwrap();
                }
                for page in 0..3 {
                    assert_eq!(region.as_bytes()[page * PAGE_SIZE + i], 0xEE);
                }
            });
        }
    });

    for path in &paths {
        let on_disk = std::fs::read(path).unwrap();
        assert!(on_disk.iter().enumerate().all(|(i, b)| *b == (i % 251) as u8));
    }
}
