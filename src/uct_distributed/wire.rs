// Copyright 2021 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The binary wire protocol shared by `DistributedClient` and
//! `InferenceServer`: an 8-byte hash handshake in each direction, then a
//! `C*N`-byte feature request answered by an `(N+2) * 4`-byte response.
//! Hashes are little-endian since they are only ever compared, never
//! interpreted; floats are written in whatever order the host's f32 uses,
//! since both ends of a deployment run on like hardware.

use std::io::{self, Read, Write};

pub fn write_hash<W: Write>(writer: &mut W, hash: u64) -> io::Result<()> {
    writer.write_all(&hash.to_le_bytes())
}

pub fn read_hash<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;

    Ok(u64::from_le_bytes(buf))
}

/// Packs a `C*N` feature tensor into the one-byte-per-cell wire format.
pub fn encode_request(planes: &[f32]) -> Vec<u8> {
    planes.iter().map(|&v| if v != 0.0 { 1u8 } else { 0u8 }).collect()
}

pub fn write_request<W: Write>(writer: &mut W, planes: &[f32]) -> io::Result<()> {
    writer.write_all(&encode_request(planes))
}

pub fn read_request<R: Read>(reader: &mut R, plane_bytes: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; plane_bytes];
    reader.read_exact(&mut buf)?;

    Ok(buf)
}

/// Unpacks the raw request bytes back into the `0.0`/`1.0` planes a
/// [`PlaneEvaluator`](crate::server::PlaneEvaluator) expects.
pub fn decode_request(bytes: &[u8]) -> Vec<f32> {
    bytes.iter().map(|&b| b as f32).collect()
}

/// Writes `(N+2)` floats: the `N+1`-entry policy (the last entry is the
/// pass probability) followed by the value.
pub fn write_response<W: Write>(writer: &mut W, policy: &[f32], value: f32) -> io::Result<()> {
    for &p in policy {
        writer.write_all(&p.to_ne_bytes())?;
    }

    writer.write_all(&value.to_ne_bytes())
}

/// Reads back a `write_response` payload for a position with `num_points`
/// points on the board (so `num_points + 1` policy entries, the last one
/// being the pass probability, plus one value).
pub fn read_response<R: Read>(reader: &mut R, num_points: usize) -> io::Result<(Vec<f32>, f32)> {
    let mut buf = vec![0u8; (num_points + 2) * 4];
    reader.read_exact(&mut buf)?;

    let mut floats = buf.chunks_exact(4).map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]));
    let policy: Vec<f32> = (&mut floats).take(num_points + 1).collect();
    let value = floats.next().unwrap_or(0.5);

    Ok((policy, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_round_trips() {
        let mut buf = Vec::new();
        write_hash(&mut buf, 0xdead_beef_1234_5678).unwrap();

        assert_eq!(read_hash(&mut &buf[..]).unwrap(), 0xdead_beef_1234_5678);
    }

    #[test]
    fn request_round_trips_through_bytes() {
        let planes = vec![0.0, 1.0, 1.0, 0.0, 1.0];
        let mut buf = Vec::new();
        write_request(&mut buf, &planes).unwrap();

        assert_eq!(buf.len(), planes.len());
        assert_eq!(decode_request(&buf), planes);
    }

    #[test]
    fn response_round_trips_with_pass_slot_and_value() {
        let policy = vec![0.1, 0.2, 0.3, 0.4]; // 3 points + pass
        let mut buf = Vec::new();
        write_response(&mut buf, &policy, 0.75).unwrap();

        let (decoded_policy, value) = read_response(&mut &buf[..], 3).unwrap();

        assert_eq!(decoded_policy, policy);
        assert_eq!(value, 0.75);
    }
}
