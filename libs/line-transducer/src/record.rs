const FIELD_SEP: u8 = b' ';
const PATH_SEP: u8 = b'.';

/// Одна telemetry-строка, разобранная на path / value / timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub path: Vec<Vec<u8>>,
    pub value: Vec<u8>,
    pub timestamp: Vec<u8>,
}

impl Record {
    pub fn new(path: &[u8], value: &[u8], timestamp: &[u8]) -> Self {
        Self {
            path: split_path(path),
            value: value.to_vec(),
            timestamp: timestamp.to_vec(),
        }
    }

    /// Разобрать строку (без `\n`).
    ///
    /// Строка короче 2 байт даёт пустую запись, недостающие поля остаются
    /// пустыми. Ошибок нет: одна битая строка не должна ронять поток.
    pub fn parse(line: &[u8]) -> Self {
        if line.len() <= 1 {
            return Self::default();
        }

        let mut fields = line.splitn(3, |&b| b == FIELD_SEP);
        let path = fields.next().map(split_path).unwrap_or_default();
        let value = fields.next().map(<[u8]>::to_vec).unwrap_or_default();
        let timestamp = fields.next().map(<[u8]>::to_vec).unwrap_or_default();

        Self { path, value, timestamp }
    }

    /// Сериализовать обратно в строку (без `\n`), дописывая в `out`.
    pub fn format_into(&self, out: &mut Vec<u8>) {
        for (i, segment) in self.path.iter().enumerate() {
            if i > 0 {
                out.push(PATH_SEP);
            }
            out.extend_from_slice(segment);
        }
        out.push(FIELD_SEP);
        out.extend_from_slice(&self.value);
        out.push(FIELD_SEP);
        out.extend_from_slice(&self.timestamp);
    }

    pub fn format(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.format_into(&mut out);
        out
    }

    /// Запись без path, value и timestamp (результат разбора вырожденной строки).
    pub fn is_degenerate(&self) -> bool {
        self.path.is_empty() && self.value.is_empty() && self.timestamp.is_empty()
    }

    /// Все три поля присутствуют (timestamp не пуст).
    pub fn is_complete(&self) -> bool {
        !self.path.is_empty() && !self.timestamp.is_empty()
    }

    fn encoded_len(&self) -> usize {
        let path_len: usize = self.path.iter().map(Vec::len).sum::<usize>()
            + self.path.len().saturating_sub(1);
        path_len + 1 + self.value.len() + 1 + self.timestamp.len()
    }
}

fn split_path(path: &[u8]) -> Vec<Vec<u8>> {
    path.split(|&b| b == PATH_SEP).map(<[u8]>::to_vec).collect()
}
