//! End-to-end scenarios driven over a real `UnixDatagram` socket, against a
//! server engine running on its own thread.

mod common;

use snfs_client::{ClientError, OpenFlags};
use snfs_protocol::SnfsError;
use snfs_types::InodeType;

#[test]
fn ping_echoes_message() {
    let server = common::spawn_server(64);
    let ctx = server.connect_stub("ping");
    assert_eq!(ctx.ping("ping-test").unwrap(), "ping-test");
}

#[test]
fn create_write_read_round_trips() {
    let server = common::spawn_server(64);
    let mut client = server.connect("writer");

    let fd = client.open("/file1.txt", OpenFlags::CREATE).unwrap();
    let payload = b"Testing SNFS write/read\0";
    let written = client.write(fd, payload).unwrap();
    assert_eq!(written, payload.len());

    let mut out = [0_u8; 256];
    let nread = client.read(fd, &mut out).unwrap();
    assert_eq!(nread, payload.len());
    assert_eq!(&out[..nread], payload);
    client.close(fd).unwrap();
}

#[test]
fn mkdir_then_listdir_reports_new_entry() {
    let server = common::spawn_server(64);
    let mut client = server.connect("dirmaker");

    client.mkdir("/mydir").unwrap();
    let entries = client.listdir("/").unwrap();
    assert_eq!(entries, vec![("mydir".to_owned(), InodeType::Dir)]);
}

#[test]
fn copy_duplicates_contents_and_size() {
    let server = common::spawn_server(64);
    let mut writer = server.connect("copy-writer");
    let ctx = server.connect_stub("copy-stub");

    let fd = writer.open("/teste.txt", OpenFlags::CREATE).unwrap();
    writer.write(fd, b"abc").unwrap();
    writer.close(fd).unwrap();

    ctx.copy("/teste.txt", "/teste_copia.txt").unwrap();

    let mut reader = server.connect("copy-reader");
    let fd = reader.open("/teste_copia.txt", OpenFlags::empty()).unwrap();
    let mut out = [0_u8; 16];
    let n = reader.read(fd, &mut out).unwrap();
    assert_eq!(&out[..n], b"abc");
}

#[test]
fn lookup_of_missing_file_reports_not_found() {
    let server = common::spawn_server(64);
    let ctx = server.connect_stub("lookup-stub");
    let err = ctx.lookup("/does_not_exist").unwrap_err();
    assert!(matches!(err, ClientError::Remote(SnfsError::NotFound)));
}

#[test]
fn concurrent_writes_do_not_tear_each_others_bytes() {
    use std::thread;

    let server = common::spawn_server(64);
    let mut setup = server.connect("concurrent-setup");
    let fd = setup.open("/shared.txt", OpenFlags::CREATE).unwrap();
    // Pre-grow so every thread's write lands in an already-allocated block.
    setup.write(fd, &[b' '; 4 * 64]).unwrap();
    setup.close(fd).unwrap();

    let handles: Vec<_> = (0_u32..4)
        .map(|tid| {
            let server_socket = server.connect_stub(&format!("concurrent-writer-{tid}"));
            thread::spawn(move || {
                let file = server_socket.lookup("/shared.txt").unwrap().file;
                let msg = format!("Thread {tid} diz oi!\n");
                server_socket.write(file, tid * 64, msg.as_bytes()).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let mut reader = server.connect("concurrent-reader");
    let fd = reader.open("/shared.txt", OpenFlags::empty()).unwrap();
    for tid in 0_u32..4 {
        let msg = format!("Thread {tid} diz oi!\n");
        let mut out = vec![0_u8; msg.len()];
        reader.read(fd, &mut out).unwrap();
        assert_eq!(out, msg.as_bytes());
        // Advance the shared read offset past this thread's slice; each
        // thread's message occupies its own 64-byte lane.
        let pad = 64 - msg.len();
        if pad > 0 {
            let mut skip = vec![0_u8; pad];
            reader.read(fd, &mut skip).unwrap();
        }
    }
}
