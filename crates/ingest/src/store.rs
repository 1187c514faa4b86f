//! 회전 저장소 -- 크기 기반 회전과 gzip 압축을 지원하는 JSON Lines 파일
//!
//! [`RotatingStore`]는 활성 파일(`syslog.jsonl`) 하나와 번호가 붙은 회전 세대
//! (`syslog.jsonl.1.gz` .. `syslog.jsonl.<max_files>.gz`)를 관리합니다.
//! 1세대가 가장 최근이고, 번호가 클수록 오래된 세대입니다.
//!
//! # 동시성
//! - `writer` 락: 활성 파일에 대한 모든 변경(append, 세대 이동, 활성 파일 교체)을 직렬화
//! - `rotation` 락: 회전 전체를 직렬화. 1세대 압축은 `writer` 락을 놓은 뒤 수행하므로
//!   압축 중에도 append는 새 활성 파일로 계속 진행됩니다.
//!
//! # 실패 처리
//! 세대 이동이나 활성 파일 이름 변경이 실패하면 이미 수행한 이름 변경을 역순으로
//! 되돌려 회전 이전 상태를 유지합니다. 압축 실패 시에는 비압축 1세대
//! (`syslog.jsonl.1`)를 보존하고 에러를 보고합니다.
//!
//! # 복구
//! 쓰기 도중 중단되어 개행 없이 끝난 마지막 줄은 `open`에서 잘라냅니다.
//! 잘라내지 않으면 다음 append가 그 줄 뒤에 이어 붙어 새 레코드까지
//! 해석할 수 없게 됩니다.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tracing::{debug, error, info, warn};

use syslog_viewer_core::config::ACTIVE_FILE_NAME;
use syslog_viewer_core::error::StoreError;
use syslog_viewer_core::metrics as m;
use syslog_viewer_core::types::LogRecord;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// 회전 저장소 설정
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// 로그 디렉토리
    pub dir: PathBuf,
    /// 회전 기준 크기 (바이트)
    pub max_bytes: u64,
    /// 보존할 회전 세대 수 (1 이상)
    pub max_files: usize,
    /// 매 append 후 `sync_data` 호출 여부
    pub fsync: bool,
}

impl StoreConfig {
    /// 기본 회전 설정(100MB, 10세대)으로 디렉토리를 지정합니다.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_bytes: 100 * 1024 * 1024,
            max_files: 10,
            fsync: false,
        }
    }
}

/// 회전 시도 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    /// 활성 파일이 없거나 기준 크기 미만이라 아무것도 하지 않음
    Skipped {
        /// 점검 시점의 활성 파일 크기
        size: u64,
    },
    /// 회전과 압축 완료
    Rotated {
        /// 회전 직전 활성 파일 크기
        size: u64,
        /// 새로 만들어진 1세대 압축 파일
        compressed: PathBuf,
    },
}

/// 활성 파일 핸들. 쓰기 실패나 회전 후에는 `None`이 되고 다음 append에서 다시 엽니다.
struct Writer {
    file: Option<File>,
}

impl Writer {
    fn file_mut(&mut self, path: &Path) -> io::Result<&mut File> {
        if self.file.is_none() {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            self.file = Some(file);
        }
        // 위에서 채웠으므로 항상 Some
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("active file handle missing"))
    }
}

/// 회전 저장소
pub struct RotatingStore {
    config: StoreConfig,
    active_path: PathBuf,
    writer: Mutex<Writer>,
    rotation: Mutex<()>,
}

impl RotatingStore {
    /// 로그 디렉토리를 만들고 활성 파일을 append 모드로 엽니다.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        fs::create_dir_all(&config.dir).map_err(|source| StoreError::Write {
            path: config.dir.clone(),
            source,
        })?;
        let active_path = config.dir.join(ACTIVE_FILE_NAME);

        match discard_truncated_tail(&active_path) {
            Ok(0) => {}
            Ok(discarded) => warn!(
                path = %active_path.display(),
                bytes = discarded,
                "discarded truncated final line"
            ),
            Err(source) => {
                return Err(StoreError::Write {
                    path: active_path,
                    source,
                });
            }
        }

        let mut writer = Writer { file: None };
        writer
            .file_mut(&active_path)
            .map_err(|source| StoreError::Write {
                path: active_path.clone(),
                source,
            })?;

        info!(
            path = %active_path.display(),
            max_size_mb = config.max_bytes as f64 / BYTES_PER_MB,
            max_files = config.max_files,
            "opened log store"
        );

        Ok(Self {
            config,
            active_path,
            writer: Mutex::new(writer),
            rotation: Mutex::new(()),
        })
    }

    /// 저장소 설정을 반환합니다.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// 활성 파일 경로
    pub fn active_path(&self) -> &Path {
        &self.active_path
    }

    /// `generation`번 세대의 경로. `compressed`면 `.gz` 접미어가 붙습니다.
    pub fn generation_path(&self, generation: usize, compressed: bool) -> PathBuf {
        let name = if compressed {
            format!("{ACTIVE_FILE_NAME}.{generation}.gz")
        } else {
            format!("{ACTIVE_FILE_NAME}.{generation}")
        };
        self.config.dir.join(name)
    }

    /// 레코드를 JSON 한 줄로 활성 파일에 기록합니다.
    ///
    /// 쓰기는 버퍼 없이 파일에 바로 전달되며, `fsync` 설정 시 `sync_data`까지
    /// 마친 뒤 반환합니다. 기록 후 활성 파일 크기를 반환합니다.
    pub fn append(&self, record: &LogRecord) -> Result<u64, StoreError> {
        let line = record.to_json_line()?;
        let mut writer = self.lock_writer();

        let result = writer.file_mut(&self.active_path).and_then(|file| {
            file.write_all(line.as_bytes())?;
            file.flush()?;
            if self.config.fsync {
                file.sync_data()?;
            }
            Ok(file.metadata()?.len())
        });

        match result {
            Ok(size) => {
                metrics::counter!(m::STORE_APPENDS_TOTAL).increment(1);
                Ok(size)
            }
            Err(source) => {
                // 다음 append에서 다시 열도록 핸들을 버림
                writer.file = None;
                metrics::counter!(m::STORE_WRITE_ERRORS_TOTAL).increment(1);
                Err(StoreError::Write {
                    path: self.active_path.clone(),
                    source,
                })
            }
        }
    }

    /// 활성 파일의 현재 크기(바이트). 파일이 없으면 0입니다.
    pub fn current_size(&self) -> Result<u64, StoreError> {
        let _writer = self.lock_writer();
        file_len(&self.active_path).map_err(|source| StoreError::Read {
            path: self.active_path.clone(),
            source,
        })
    }

    /// 활성 파일이 기준 크기 이상이면 회전합니다.
    ///
    /// 1. 가장 오래된 세대(`max_files`)를 삭제하고 `k` → `k+1`로 이동
    /// 2. 활성 파일을 1세대(비압축)로 이름 변경 후 새 활성 파일 생성
    /// 3. 1세대를 gzip으로 압축하고 비압축 파일 삭제
    ///
    /// 기준 크기 미만이면 아무것도 하지 않으므로 중복 호출해도 안전합니다.
    pub fn rotate(&self) -> Result<RotationOutcome, StoreError> {
        let _rotation = self.rotation.lock().unwrap_or_else(PoisonError::into_inner);
        let started = Instant::now();

        let (size, plain) = {
            let mut writer = self.lock_writer();

            let size = match fs::metadata(&self.active_path) {
                Ok(meta) => meta.len(),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Ok(RotationOutcome::Skipped { size: 0 });
                }
                Err(source) => {
                    return Err(StoreError::Rotation {
                        step: "stat active file",
                        source,
                    });
                }
            };
            if size < self.config.max_bytes {
                return Ok(RotationOutcome::Skipped { size });
            }

            info!(
                size_mb = size as f64 / BYTES_PER_MB,
                "rotating log file"
            );

            if let Some(file) = writer.file.take()
                && let Err(e) = file.sync_all()
            {
                warn!(error = %e, "failed to sync active file before rotation");
            }

            if let Err(err) = self.shift_generations() {
                metrics::counter!(m::STORE_ROTATION_FAILURES_TOTAL).increment(1);
                return Err(err);
            }

            match OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.active_path)
            {
                Ok(file) => writer.file = Some(file),
                Err(e) => warn!(
                    error = %e,
                    path = %self.active_path.display(),
                    "failed to create new active file, will retry on next append"
                ),
            }

            (size, self.generation_path(1, false))
        };

        let compressed = self.generation_path(1, true);
        if let Err(source) = compress_file(&plain, &compressed) {
            metrics::counter!(m::STORE_ROTATION_FAILURES_TOTAL).increment(1);
            let _ = fs::remove_file(&compressed);
            error!(
                error = %source,
                path = %plain.display(),
                "compression failed, keeping uncompressed generation"
            );
            return Err(StoreError::Compress {
                path: plain,
                source,
            });
        }
        if let Err(e) = fs::remove_file(&plain) {
            warn!(error = %e, path = %plain.display(), "failed to remove uncompressed generation");
        }

        metrics::counter!(m::STORE_ROTATIONS_TOTAL).increment(1);
        metrics::histogram!(m::STORE_ROTATION_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        info!(file = %display_name(&compressed), "log rotation complete");

        Ok(RotationOutcome::Rotated { size, compressed })
    }

    /// 세대 번호를 하나씩 밀고 활성 파일을 1세대로 옮깁니다.
    ///
    /// `writer` 락을 잡은 상태에서 호출해야 합니다. 실패하면 이미 수행한
    /// 이름 변경을 되돌립니다. 가장 오래된 세대의 삭제는 되돌리지 않습니다.
    fn shift_generations(&self) -> Result<(), StoreError> {
        let max = self.config.max_files;

        for compressed in [true, false] {
            let oldest = self.generation_path(max, compressed);
            match fs::remove_file(&oldest) {
                Ok(()) => info!(file = %display_name(&oldest), "deleted oldest log file"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(StoreError::Rotation {
                        step: "delete oldest generation",
                        source,
                    });
                }
            }
        }

        let mut journal = RenameJournal::default();
        for generation in (1..max).rev() {
            for compressed in [true, false] {
                let from = self.generation_path(generation, compressed);
                if !from.exists() {
                    continue;
                }
                let to = self.generation_path(generation + 1, compressed);
                if let Err(source) = journal.rename(&from, &to) {
                    journal.rollback();
                    return Err(StoreError::Rotation {
                        step: "shift generation",
                        source,
                    });
                }
            }
        }

        let first = self.generation_path(1, false);
        if let Err(source) = journal.rename(&self.active_path, &first) {
            journal.rollback();
            return Err(StoreError::Rotation {
                step: "rename active file",
                source,
            });
        }

        Ok(())
    }

    /// 활성 파일과 가장 최근 세대에서 마지막 `limit`개 레코드를 읽습니다.
    ///
    /// 개행으로 끝나지 않는 마지막 줄(쓰기 도중 중단)과 JSON으로 해석되지 않는
    /// 줄은 버립니다. 결과는 오래된 것부터 최신 순입니다.
    pub fn read_recent(&self, limit: usize) -> Result<Vec<LogRecord>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut records =
            read_tail(&self.active_path, limit).map_err(|source| StoreError::Read {
                path: self.active_path.clone(),
                source,
            })?;

        if records.len() < limit
            && let Some(older) = self.read_newest_generation(limit - records.len())?
        {
            for record in older.into_iter().rev() {
                records.push_front(record);
            }
        }

        Ok(records.into())
    }

    fn read_newest_generation(
        &self,
        limit: usize,
    ) -> Result<Option<VecDeque<LogRecord>>, StoreError> {
        let plain = self.generation_path(1, false);
        let compressed = self.generation_path(1, true);

        let opened = |path: &Path| -> Result<Option<File>, StoreError> {
            match File::open(path) {
                Ok(file) => Ok(Some(file)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(source) => Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source,
                }),
            }
        };

        // 압축 실패로 남은 비압축 1세대가 있으면 그것이 최신
        if let Some(file) = opened(&plain)? {
            return Ok(Some(tail_records(BufReader::new(file), limit, &plain)));
        }
        if let Some(file) = opened(&compressed)? {
            let reader = BufReader::new(GzDecoder::new(file));
            return Ok(Some(tail_records(reader, limit, &compressed)));
        }
        Ok(None)
    }

    /// 진행 중인 append가 끝나기를 기다린 뒤 활성 파일을 동기화하고 닫습니다.
    ///
    /// 닫은 뒤에 append가 오면 파일을 다시 엽니다.
    pub fn close(&self) -> Result<(), StoreError> {
        let mut writer = self.lock_writer();
        if let Some(file) = writer.file.take() {
            file.sync_all().map_err(|source| StoreError::Write {
                path: self.active_path.clone(),
                source,
            })?;
            debug!(path = %self.active_path.display(), "closed active log file");
        }
        Ok(())
    }

    fn lock_writer(&self) -> MutexGuard<'_, Writer> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 수행한 이름 변경을 기록했다가 실패 시 역순으로 되돌립니다.
#[derive(Default)]
struct RenameJournal {
    done: Vec<(PathBuf, PathBuf)>,
}

impl RenameJournal {
    fn rename(&mut self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)?;
        self.done.push((from.to_path_buf(), to.to_path_buf()));
        Ok(())
    }

    fn rollback(self) {
        for (from, to) in self.done.into_iter().rev() {
            if let Err(e) = fs::rename(&to, &from) {
                error!(
                    error = %e,
                    from = %to.display(),
                    to = %from.display(),
                    "failed to roll back rotation rename"
                );
            }
        }
    }
}

fn file_len(path: &Path) -> io::Result<u64> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn compress_file(src: &Path, dst: &Path) -> io::Result<()> {
    let mut input = File::open(src)?;
    let output = File::create(dst)?;
    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    io::copy(&mut input, &mut encoder)?;
    let file = encoder
        .finish()?
        .into_inner()
        .map_err(io::IntoInnerError::into_error)?;
    file.sync_all()
}

const TAIL_CHUNK: u64 = 64 * 1024;

/// 파일 끝에서 거꾸로 읽어 마지막 `lines`개 완전한 줄이 시작되는 오프셋을 찾습니다.
///
/// 개행 없이 끝나는 마지막 조각은 줄로 세지 않습니다. 줄이 모자라면 0입니다.
fn tail_offset(file: &mut File, lines: usize) -> io::Result<u64> {
    let mut pos = file.metadata()?.len();
    let mut buf = vec![0u8; TAIL_CHUNK as usize];
    let mut newlines = 0usize;

    while pos > 0 {
        let read_len = TAIL_CHUNK.min(pos);
        pos -= read_len;
        let chunk = &mut buf[..read_len as usize];
        file.seek(SeekFrom::Start(pos))?;
        file.read_exact(chunk)?;

        for (i, byte) in chunk.iter().enumerate().rev() {
            if *byte == b'\n' {
                newlines += 1;
                if newlines > lines {
                    return Ok(pos + i as u64 + 1);
                }
            }
        }
    }
    Ok(0)
}

/// 개행으로 끝나지 않는 마지막 조각을 잘라내고 잘라낸 바이트 수를 반환합니다.
fn discard_truncated_tail(path: &Path) -> io::Result<u64> {
    let mut file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(0);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(0);
    }

    // 완전한 줄 0개 = 마지막 개행 바로 뒤
    let keep = tail_offset(&mut file, 0)?;
    file.set_len(keep)?;
    file.sync_all()?;
    Ok(len - keep)
}

/// 활성 파일 끝에서부터 필요한 만큼만 읽어 마지막 `limit`개 레코드를 모읍니다.
///
/// 해석할 수 없는 줄 때문에 모자라면 읽을 범위를 두 배로 늘려 다시 읽습니다.
fn read_tail(path: &Path, limit: usize) -> io::Result<VecDeque<LogRecord>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(VecDeque::new()),
        Err(e) => return Err(e),
    };

    let mut lines = limit;
    loop {
        let offset = tail_offset(&mut file, lines)?;
        file.seek(SeekFrom::Start(offset))?;
        let records = tail_records(BufReader::new(&mut file), limit, path);
        if records.len() >= limit || offset == 0 {
            return Ok(records);
        }
        lines = lines.saturating_mul(2);
    }
}

/// 리더에서 완전한 줄만 읽어 마지막 `limit`개 레코드를 모읍니다.
fn tail_records<R: BufRead>(mut reader: R, limit: usize, path: &Path) -> VecDeque<LogRecord> {
    let mut records = VecDeque::with_capacity(limit.min(10_000));
    let mut line = Vec::new();
    let mut skipped = 0usize;

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                if line.last() != Some(&b'\n') {
                    debug!(path = %path.display(), bytes = line.len(), "discarding truncated final line");
                    break;
                }
                match std::str::from_utf8(&line)
                    .ok()
                    .and_then(|text| LogRecord::from_json_line(text).ok())
                {
                    Some(record) => {
                        if records.len() == limit {
                            records.pop_front();
                        }
                        records.push_back(record);
                    }
                    None => skipped += 1,
                }
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "stopped reading log history early");
                break;
            }
        }
    }

    if skipped > 0 {
        warn!(path = %path.display(), skipped, "skipped unparseable log lines");
    }
    records
}
