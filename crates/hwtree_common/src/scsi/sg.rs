//! Linux SCSI generic driver endpoints
//!
//! `/dev/sg<N>` speaks the SG_IO interface; the candidate block and tape
//! nodes only answer the older `SCSI_IOCTL_*` identity queries.

use super::identity::CandidateProbe;
use super::transport::{CommandBlock, ControlEndpoint, EndpointOpener, Reply, ScsiId, SENSE_BUFFER_LEN};
use crate::error::ProbeError;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::time::Duration;

mod ioctls {
    use nix::{ioctl_read_bad, ioctl_readwrite_bad};

    pub const SG_IO: u32 = 0x2285;
    pub const SG_GET_SCSI_ID: u32 = 0x2276;
    pub const SG_GET_VERSION_NUM: u32 = 0x2282;
    pub const SG_EMULATED_HOST: u32 = 0x2203;
    pub const SCSI_IOCTL_GET_IDLUN: u32 = 0x5382;
    pub const SCSI_IOCTL_GET_BUS_NUMBER: u32 = 0x5386;
    pub const SCSI_IOCTL_GET_PCI: u32 = 0x5387;

    pub const SG_INTERFACE_ID: libc::c_int = b'S' as libc::c_int;
    pub const SG_DXFER_FROM_DEV: libc::c_int = -3;

    /// `struct sg_io_hdr` from `<scsi/sg.h>`
    #[repr(C)]
    pub struct SgIoHdr {
        pub interface_id: libc::c_int,
        pub dxfer_direction: libc::c_int,
        pub cmd_len: libc::c_uchar,
        pub mx_sb_len: libc::c_uchar,
        pub iovec_count: libc::c_ushort,
        pub dxfer_len: libc::c_uint,
        pub dxferp: *mut libc::c_void,
        pub cmdp: *const libc::c_uchar,
        pub sbp: *mut libc::c_uchar,
        pub timeout: libc::c_uint,
        pub flags: libc::c_uint,
        pub pack_id: libc::c_int,
        pub usr_ptr: *mut libc::c_void,
        pub status: libc::c_uchar,
        pub masked_status: libc::c_uchar,
        pub msg_status: libc::c_uchar,
        pub sb_len_wr: libc::c_uchar,
        pub host_status: libc::c_ushort,
        pub driver_status: libc::c_ushort,
        pub resid: libc::c_int,
        pub duration: libc::c_uint,
        pub info: libc::c_uint,
    }

    /// `struct sg_scsi_id`
    #[repr(C)]
    #[derive(Default)]
    pub struct SgScsiId {
        pub host_no: libc::c_int,
        pub channel: libc::c_int,
        pub scsi_id: libc::c_int,
        pub lun: libc::c_int,
        pub scsi_type: libc::c_int,
        pub h_cmd_per_lun: libc::c_short,
        pub d_queue_depth: libc::c_short,
        pub unused: [libc::c_int; 2],
    }

    /// Reply of `SCSI_IOCTL_GET_IDLUN`
    #[repr(C)]
    #[derive(Default)]
    pub struct ScsiIdlun {
        pub mux4: libc::c_int,
        pub host_unique_id: libc::c_int,
    }

    ioctl_readwrite_bad!(sg_io, SG_IO, SgIoHdr);
    ioctl_read_bad!(sg_get_scsi_id, SG_GET_SCSI_ID, SgScsiId);
    ioctl_read_bad!(sg_get_version_num, SG_GET_VERSION_NUM, libc::c_int);
    ioctl_read_bad!(sg_emulated_host, SG_EMULATED_HOST, libc::c_int);
    ioctl_read_bad!(scsi_get_idlun, SCSI_IOCTL_GET_IDLUN, ScsiIdlun);
    ioctl_read_bad!(scsi_get_bus_number, SCSI_IOCTL_GET_BUS_NUMBER, libc::c_int);
    ioctl_read_bad!(scsi_get_pci, SCSI_IOCTL_GET_PCI, [u8; 32]);
}

fn open_nonblocking(path: &str, write: bool) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(write)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
}

/// One opened `/dev/sg<N>`. Closed on drop.
#[derive(Debug)]
pub struct SgEndpoint {
    file: File,
    path: String,
}

impl SgEndpoint {
    pub fn open(path: impl Into<String>) -> Result<Self, ProbeError> {
        let path = path.into();
        let file = open_nonblocking(&path, true).map_err(|e| ProbeError::transport(&path, e))?;
        Ok(Self { file, path })
    }

    fn ioctl_error(&self, errno: nix::errno::Errno) -> ProbeError {
        ProbeError::transport(&self.path, io::Error::from(errno))
    }

    fn emulated(&self) -> bool {
        let mut flag: libc::c_int = 0;
        // SAFETY: the fd is open for the lifetime of `self.file`; `flag` is a
        // valid int the driver writes into.
        let result = unsafe { ioctls::sg_emulated_host(self.file.as_raw_fd(), &mut flag) };
        result.is_ok() && flag != 0
    }
}

impl ControlEndpoint for SgEndpoint {
    fn path(&self) -> &str {
        &self.path
    }

    fn send(&mut self, cdb: &CommandBlock, capacity: usize, timeout: Duration) -> Result<Reply, ProbeError> {
        let command = *cdb.as_bytes();
        let mut data = vec![0u8; capacity];
        let mut sense = vec![0u8; SENSE_BUFFER_LEN];

        let mut hdr = ioctls::SgIoHdr {
            interface_id: ioctls::SG_INTERFACE_ID,
            dxfer_direction: ioctls::SG_DXFER_FROM_DEV,
            cmd_len: command.len() as libc::c_uchar,
            mx_sb_len: SENSE_BUFFER_LEN as libc::c_uchar,
            iovec_count: 0,
            dxfer_len: capacity as libc::c_uint,
            dxferp: data.as_mut_ptr().cast(),
            cmdp: command.as_ptr(),
            sbp: sense.as_mut_ptr(),
            timeout: timeout.as_millis().min(u128::from(u32::MAX)) as libc::c_uint,
            flags: 0,
            pack_id: 0,
            usr_ptr: std::ptr::null_mut(),
            status: 0,
            masked_status: 0,
            msg_status: 0,
            sb_len_wr: 0,
            host_status: 0,
            driver_status: 0,
            resid: 0,
            duration: 0,
            info: 0,
        };

        // SAFETY: every pointer in `hdr` refers to a buffer that outlives the
        // call, and the lengths match the buffers they describe.
        let result = unsafe { ioctls::sg_io(self.file.as_raw_fd(), &mut hdr) };
        result.map_err(|e| self.ioctl_error(e))?;

        if hdr.resid > 0 && (hdr.resid as usize) <= capacity {
            data.truncate(capacity - hdr.resid as usize);
        }
        sense.truncate(usize::from(hdr.sb_len_wr).min(SENSE_BUFFER_LEN));

        Ok(Reply {
            status: hdr.status,
            host_status: hdr.host_status,
            driver_status: hdr.driver_status,
            data,
            sense,
        })
    }

    fn scsi_id(&mut self) -> Result<ScsiId, ProbeError> {
        let mut raw = ioctls::SgScsiId::default();
        // SAFETY: `raw` is a correctly laid out sg_scsi_id.
        let result = unsafe { ioctls::sg_get_scsi_id(self.file.as_raw_fd(), &mut raw) };
        result.map_err(|e| self.ioctl_error(e))?;

        Ok(ScsiId {
            host: raw.host_no.max(0) as u32,
            channel: raw.channel.max(0) as u32,
            target: raw.scsi_id.max(0) as u32,
            lun: raw.lun.max(0) as u32,
            peripheral_type: (raw.scsi_type & 0x1f) as u8,
            emulated: self.emulated(),
        })
    }

    fn platform_slot(&mut self) -> Option<String> {
        let mut slot = [0u8; 32];
        // SAFETY: the driver copies at most 20 bytes into `slot`.
        let result = unsafe { ioctls::scsi_get_pci(self.file.as_raw_fd(), &mut slot) };
        result.ok()?;
        let end = slot.iter().position(|b| *b == 0).unwrap_or(slot.len());
        let name = String::from_utf8_lossy(&slot[..end]).trim().to_string();
        (!name.is_empty()).then_some(name)
    }

    fn driver_version(&mut self) -> Result<i32, ProbeError> {
        let mut version: libc::c_int = 0;
        // SAFETY: `version` is a valid int for the driver to fill.
        let result = unsafe { ioctls::sg_get_version_num(self.file.as_raw_fd(), &mut version) };
        result.map_err(|e| self.ioctl_error(e))?;
        Ok(version)
    }
}

/// Opens `/dev/sg<N>` from a path template where `{}` stands for the index
#[derive(Debug, Clone)]
pub struct SgOpener {
    template: String,
}

impl SgOpener {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn path_for(&self, index: u32) -> String {
        self.template.replace("{}", &index.to_string())
    }
}

impl Default for SgOpener {
    fn default() -> Self {
        Self::new("/dev/sg{}")
    }
}

impl EndpointOpener for SgOpener {
    type Endpoint = SgEndpoint;

    fn open(&self, index: u32) -> Result<SgEndpoint, ProbeError> {
        SgEndpoint::open(self.path_for(index))
    }
}

/// Queries candidate block/char nodes with the `SCSI_IOCTL_*` pair
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxCandidateProbe;

impl CandidateProbe for LinuxCandidateProbe {
    fn query(&self, path: &str) -> Option<(u32, u32)> {
        let file = open_nonblocking(path, false).ok()?;
        let fd = file.as_raw_fd();

        let mut bus: libc::c_int = 0;
        // SAFETY: `bus` is a valid int for the driver to fill.
        let result = unsafe { ioctls::scsi_get_bus_number(fd, &mut bus) };
        result.ok()?;

        let mut idlun = ioctls::ScsiIdlun::default();
        // SAFETY: `idlun` matches the kernel's two-int reply.
        let result = unsafe { ioctls::scsi_get_idlun(fd, &mut idlun) };
        result.ok()?;

        Some((bus.max(0) as u32, idlun.mux4 as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_template() {
        assert_eq!(SgOpener::default().path_for(3), "/dev/sg3");
        assert_eq!(SgOpener::new("/tmp/fake-sg{}").path_for(12), "/tmp/fake-sg12");
    }

    #[test]
    fn test_missing_endpoint_is_transport_error() {
        let opener = SgOpener::new("/nonexistent/hwtree-sg{}");
        let err = opener.open(0).unwrap_err();
        assert!(matches!(err, ProbeError::Transport { .. }));
        assert!(!err.is_protocol());
    }

    #[test]
    fn test_missing_candidate_does_not_answer() {
        assert_eq!(LinuxCandidateProbe.query("/nonexistent/hwtree-sda"), None);
    }

    #[test]
    fn test_header_layout() {
        // 64-bit kernels expect an 88-byte sg_io_hdr
        #[cfg(target_pointer_width = "64")]
        assert_eq!(std::mem::size_of::<ioctls::SgIoHdr>(), 88);
        assert_eq!(std::mem::size_of::<ioctls::SgScsiId>(), 32);
    }
}
