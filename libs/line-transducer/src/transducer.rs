use crate::aggregate::AggregateEmitter;
use crate::config::TransducerConfig;
use crate::error::TransducerError;
use crate::filter::FilterPolicy;
use crate::record::Record;

const NEWLINE: u8 = b'\n';

// ═══════════════════════════════════════════════════════════════
//  Результат одного вызова transform
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Весь вход обработан (неполный хвост ушёл в carry).
    Ok,
    /// Очередная строка не поместилась в output. Необработанный вход
    /// не потреблён: повторить с `input[consumed..]` и большим буфером.
    ShortBuffer,
    /// Обработка остановлена перед строкой, которая не проходит проверку
    /// длины. Уже закоммиченное отдано в output; вызов с `input[consumed..]`
    /// вернёт ошибку.
    Halted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transformed {
    /// Сколько байт входа потреблено (включая ушедшие в carry).
    pub consumed: usize,
    /// Сколько байт записано в output.
    pub produced: usize,
    pub outcome: Outcome,
}

impl Transformed {
    pub fn is_short(&self) -> bool {
        self.outcome == Outcome::ShortBuffer
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransducerStats {
    pub lines_forwarded: u64,
    pub lines_suppressed: u64,
    pub captures: u64,
    pub aggregates_emitted: u64,
}

// ═══════════════════════════════════════════════════════════════
//  StreamTransducer
// ═══════════════════════════════════════════════════════════════

/// Построчный transducer поверх непрерывного потока байт.
///
/// Один экземпляр на одно направление одного соединения. Преобразуются
/// только строки, завершённые `\n`; неполный хвост копится в carry до
/// следующего вызова или до `at_end`.
#[derive(Debug)]
pub struct StreamTransducer {
    policy: FilterPolicy,
    emitter: AggregateEmitter,
    emit_aggregate: bool,
    max_line_length: usize,
    carry: Vec<u8>,
    scratch: Vec<u8>,
    stats: TransducerStats,
}

impl StreamTransducer {
    pub fn new(config: &TransducerConfig) -> Result<Self, TransducerError> {
        config.validate()?;
        let mut transducer = Self::from_parts(
            FilterPolicy::from_config(config),
            AggregateEmitter::new(config.aggregate_path.as_bytes()),
        );
        transducer.emit_aggregate = config.emit_aggregate;
        transducer.max_line_length = config.max_line_length;
        Ok(transducer)
    }

    pub fn from_parts(policy: FilterPolicy, emitter: AggregateEmitter) -> Self {
        Self {
            policy,
            emitter,
            emit_aggregate: true,
            max_line_length: 0,
            carry: Vec::new(),
            scratch: Vec::new(),
            stats: TransducerStats::default(),
        }
    }

    pub fn carry(&self) -> &[u8] {
        &self.carry
    }

    pub fn emitter(&self) -> &AggregateEmitter {
        &self.emitter
    }

    pub fn stats(&self) -> &TransducerStats {
        &self.stats
    }

    /// Преобразовать очередной кусок потока в `output`.
    ///
    /// Строки обрабатываются по одной; строка коммитится (состояние
    /// aggregate, carry, счётчики) только если её вывод целиком поместился.
    pub fn transform(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        at_end: bool,
    ) -> Result<Transformed, TransducerError> {
        let mut consumed = 0;
        let mut produced = 0;

        while let Some(pos) = input[consumed..].iter().position(|&b| b == NEWLINE) {
            let end = consumed + pos;
            let written = match self.commit_with_carry(&input[consumed..end], true, &mut output[produced..]) {
                Ok(written) => written,
                Err(e) => return halt_or_fail(consumed, produced, e),
            };
            match written {
                Some(n) => {
                    produced += n;
                    consumed = end + 1;
                }
                None => return Ok(Transformed { consumed, produced, outcome: Outcome::ShortBuffer }),
            }
        }

        let tail = &input[consumed..];
        if !at_end {
            let len = self.carry.len() + tail.len();
            if self.exceeds(len) {
                let e = TransducerError::NoNewline { len, max: self.max_line_length };
                return halt_or_fail(consumed, produced, e);
            }
            self.carry.extend_from_slice(tail);
            return Ok(Transformed { consumed: input.len(), produced, outcome: Outcome::Ok });
        }

        if self.carry.is_empty() && tail.is_empty() {
            return Ok(Transformed { consumed, produced, outcome: Outcome::Ok });
        }

        // Конец потока: хвост без `\n` отдаётся как есть, без терминатора.
        match self.commit_with_carry(tail, false, &mut output[produced..]) {
            Ok(Some(n)) => Ok(Transformed { consumed: input.len(), produced: produced + n, outcome: Outcome::Ok }),
            Ok(None) => Ok(Transformed { consumed, produced, outcome: Outcome::ShortBuffer }),
            Err(e) => halt_or_fail(consumed, produced, e),
        }
    }

    /// Склеить carry с `fragment` и закоммитить как одну строку.
    /// При неудаче carry остаётся прежним.
    fn commit_with_carry(
        &mut self,
        fragment: &[u8],
        terminated: bool,
        out: &mut [u8],
    ) -> Result<Option<usize>, TransducerError> {
        if self.carry.is_empty() {
            self.check_length(fragment.len())?;
            return Ok(self.commit_line(fragment, terminated, out));
        }

        let mut line = std::mem::take(&mut self.carry);
        let carried = line.len();
        line.extend_from_slice(fragment);

        let written = match self.check_length(line.len()) {
            Ok(()) => self.commit_line(&line, terminated, out),
            Err(e) => {
                line.truncate(carried);
                self.carry = line;
                return Err(e);
            }
        };

        if written.is_some() {
            line.clear();
        } else {
            line.truncate(carried);
        }
        // Аллокация переиспользуется под следующий carry.
        self.carry = line;
        Ok(written)
    }

    fn commit_line(&mut self, line: &[u8], terminated: bool, out: &mut [u8]) -> Option<usize> {
        if self.policy.is_suppressed(line) {
            if let Some(value) = self.policy.captured_value(line) {
                self.emitter.observe_capture(value);
                self.stats.captures += 1;
            }
            self.stats.lines_suppressed += 1;
            return Some(0);
        }

        let mut record = Record::parse(line);
        let aggregate = if self.emit_aggregate && !record.is_degenerate() {
            self.emitter.pending(&record.timestamp)
        } else {
            None
        };

        let mut rendered = std::mem::take(&mut self.scratch);
        rendered.clear();
        if let Some(aggregate) = &aggregate {
            aggregate.format_into(&mut rendered);
            rendered.push(NEWLINE);
        }
        if record.is_complete() && self.policy.rewrite_path(&mut record, self.emitter.last_captured()) {
            record.format_into(&mut rendered);
        } else {
            rendered.extend_from_slice(line);
        }
        if terminated {
            rendered.push(NEWLINE);
        }

        let n = rendered.len();
        let fits = n <= out.len();
        if fits {
            out[..n].copy_from_slice(&rendered);
            if aggregate.is_some() {
                self.emitter.mark_emitted(&record.timestamp);
                self.stats.aggregates_emitted += 1;
                tracing::trace!(
                    timestamp = %String::from_utf8_lossy(&record.timestamp),
                    value = %String::from_utf8_lossy(self.emitter.last_captured()),
                    "aggregate emitted"
                );
            }
            self.stats.lines_forwarded += 1;
        }
        self.scratch = rendered;

        fits.then_some(n)
    }

    fn exceeds(&self, len: usize) -> bool {
        self.max_line_length > 0 && len > self.max_line_length
    }

    fn check_length(&self, len: usize) -> Result<(), TransducerError> {
        if self.exceeds(len) {
            return Err(TransducerError::LineTooLong { len, max: self.max_line_length });
        }
        Ok(())
    }
}

/// Ошибка длины после закоммиченных строк откладывается до следующего
/// вызова, иначе вызывающий не узнал бы про уже записанный output.
fn halt_or_fail(consumed: usize, produced: usize, e: TransducerError) -> Result<Transformed, TransducerError> {
    if consumed == 0 {
        return Err(e);
    }
    Ok(Transformed { consumed, produced, outcome: Outcome::Halted })
}
