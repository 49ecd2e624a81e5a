// Binary wire format for command batches.
//
// One transport message carries one batch:
//
//   u16 count, then `count` records of
//     u8  kind        (Action::kind)
//     i64 time
//     u8  player
//     payload         Place:        row i16, col i16
//                     Move/Attack:  src row, src col, dst row, dst col (i16)
//                     Start/Step:   hash (u64 bits), hash_time i64
//
// All integers little-endian, fixed width, no padding. The record layout is
// fully determined by the kind byte, so decoding needs no lengths.
//
// `LocalCommand`s have no encoding; they never leave the machine.
//
// See also: `command.rs` for the types, `coordinator.rs` for batching.

use std::io::{self, Cursor, Read, Write};

use crate::command::{Action, Command, SyncStamp};
use crate::types::{InvalidPlayer, Location, PlayerId};

/// Largest batch the count prefix can describe.
pub const MAX_BATCH: usize = u16::MAX as usize;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("truncated or unreadable batch: {0}")]
    Io(#[from] io::Error),
    #[error("unknown command kind {0}")]
    UnknownKind(u8),
    #[error(transparent)]
    InvalidPlayer(#[from] InvalidPlayer),
    #[error("batch of {0} commands exceeds the limit of {MAX_BATCH}", MAX_BATCH = MAX_BATCH)]
    BatchTooLarge(usize),
    #[error("{0} bytes left over after the last command")]
    TrailingBytes(usize),
}

pub fn encode_batch(commands: &[Command]) -> Result<Vec<u8>, WireError> {
    let count = u16::try_from(commands.len()).map_err(|_| WireError::BatchTooLarge(commands.len()))?;
    let mut buf = Vec::with_capacity(2 + commands.len() * 28);
    buf.extend_from_slice(&count.to_le_bytes());
    for command in commands {
        write_command(&mut buf, command)?;
    }
    Ok(buf)
}

pub fn decode_batch(bytes: &[u8]) -> Result<Vec<Command>, WireError> {
    let mut cursor = Cursor::new(bytes);
    let count = read_u16(&mut cursor)?;
    let commands = (0..count)
        .map(|_| read_command(&mut cursor))
        .collect::<Result<Vec<_>, _>>()?;
    let leftover = bytes.len() - cursor.position() as usize;
    if leftover > 0 {
        return Err(WireError::TrailingBytes(leftover));
    }
    Ok(commands)
}

pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> io::Result<()> {
    writer.write_all(&[command.action.kind()])?;
    writer.write_all(&command.time.to_le_bytes())?;
    writer.write_all(&[command.player.raw()])?;
    match command.action {
        Action::Place { at } => write_location(writer, at),
        Action::Move { from, to } | Action::Attack { from, to } => {
            write_location(writer, from)?;
            write_location(writer, to)
        }
        Action::StartSync(stamp) | Action::StepSync(stamp) => {
            writer.write_all(&stamp.hash.to_le_bytes())?;
            writer.write_all(&stamp.hash_time.to_le_bytes())
        }
    }
}

pub fn read_command<R: Read>(reader: &mut R) -> Result<Command, WireError> {
    let kind = read_u8(reader)?;
    let time = i64::from_le_bytes(read_array(reader)?);
    let player = PlayerId::try_from(read_u8(reader)?)?;
    let action = match kind {
        1 => Action::Place {
            at: read_location(reader)?,
        },
        2 => Action::Move {
            from: read_location(reader)?,
            to: read_location(reader)?,
        },
        3 => Action::Attack {
            from: read_location(reader)?,
            to: read_location(reader)?,
        },
        4 => Action::StartSync(read_stamp(reader)?),
        5 => Action::StepSync(read_stamp(reader)?),
        other => return Err(WireError::UnknownKind(other)),
    };
    Ok(Command { time, player, action })
}

fn write_location<W: Write>(writer: &mut W, location: Location) -> io::Result<()> {
    writer.write_all(&location.row.to_le_bytes())?;
    writer.write_all(&location.col.to_le_bytes())
}

fn read_location<R: Read>(reader: &mut R) -> io::Result<Location> {
    let row = i16::from_le_bytes(read_array(reader)?);
    let col = i16::from_le_bytes(read_array(reader)?);
    Ok(Location::new(row, col))
}

fn read_stamp<R: Read>(reader: &mut R) -> io::Result<SyncStamp> {
    let hash = u64::from_le_bytes(read_array(reader)?);
    let hash_time = i64::from_le_bytes(read_array(reader)?);
    Ok(SyncStamp { hash, hash_time })
}

fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    Ok(read_array::<_, 1>(reader)?[0])
}

fn read_u16<R: Read>(reader: &mut R) -> io::Result<u16> {
    Ok(u16::from_le_bytes(read_array(reader)?))
}

fn read_array<R: Read, const N: usize>(reader: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    fn sample_batch() -> Vec<Command> {
        vec![
            Command {
                time: 200,
                player: P0,
                action: Action::Place { at: loc(-3, 7) },
            },
            Command {
                time: 210,
                player: P3,
                action: Action::Attack {
                    from: loc(1, 2),
                    to: loc(1, 3),
                },
            },
            Command {
                time: 300,
                player: P1,
                action: Action::StepSync(SyncStamp {
                    hash: u64::MAX - 5,
                    hash_time: 99,
                }),
            },
        ]
    }

    #[test]
    fn batch_survives_the_wire() {
        let batch = sample_batch();
        let bytes = encode_batch(&batch).unwrap();
        assert_eq!(decode_batch(&bytes).unwrap(), batch);
    }

    #[test]
    fn place_record_layout_is_fixed() {
        let bytes = encode_batch(&sample_batch()[..1]).unwrap();
        let mut expected = vec![1, 0, 1];
        expected.extend_from_slice(&200i64.to_le_bytes());
        expected.push(0);
        expected.extend_from_slice(&(-3i16).to_le_bytes());
        expected.extend_from_slice(&7i16.to_le_bytes());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn empty_batch_is_two_bytes() {
        let bytes = encode_batch(&[]).unwrap();
        assert_eq!(bytes, vec![0, 0]);
        assert!(decode_batch(&bytes).unwrap().is_empty());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut bytes = encode_batch(&sample_batch()[..1]).unwrap();
        bytes[2] = 42;
        assert!(matches!(decode_batch(&bytes), Err(WireError::UnknownKind(42))));
    }

    #[test]
    fn out_of_range_player_is_rejected() {
        let mut bytes = encode_batch(&sample_batch()[..1]).unwrap();
        bytes[11] = 4;
        assert!(matches!(
            decode_batch(&bytes),
            Err(WireError::InvalidPlayer(InvalidPlayer(4)))
        ));
    }

    #[test]
    fn truncation_and_trailing_bytes_are_rejected() {
        let bytes = encode_batch(&sample_batch()).unwrap();
        assert!(matches!(
            decode_batch(&bytes[..bytes.len() - 1]),
            Err(WireError::Io(_))
        ));

        let mut padded = bytes.clone();
        padded.extend_from_slice(&[0, 0, 0]);
        assert!(matches!(decode_batch(&padded), Err(WireError::TrailingBytes(3))));
    }

    #[test]
    fn oversized_batches_are_refused() {
        let command = sample_batch()[0];
        let batch = vec![command; MAX_BATCH + 1];
        assert!(matches!(
            encode_batch(&batch),
            Err(WireError::BatchTooLarge(n)) if n == MAX_BATCH + 1
        ));
    }
}
