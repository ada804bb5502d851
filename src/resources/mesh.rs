use cgmath::{InnerSpace, Vector2, Vector3};

use crate::data_structures::model::ModelVertex;

/**
 * Not every glTF primitive ships tangents, but normal mapping needs them. This
 * derives per-vertex tangents and bitangents from positions and UVs, averaged
 * over all triangles that share a vertex.
 */
pub fn compute_tangents(vertices: &mut [ModelVertex], indices: &[u32]) {
    let mut triangles_included = vec![0u32; vertices.len()];

    for c in indices.chunks_exact(3) {
        let (i0, i1, i2) = (c[0] as usize, c[1] as usize, c[2] as usize);
        if i0 >= vertices.len() || i1 >= vertices.len() || i2 >= vertices.len() {
            log::warn!("Skipping triangle {:?} with out of range indices", c);
            continue;
        }
        let v0 = vertices[i0];
        let v1 = vertices[i1];
        let v2 = vertices[i2];

        let pos0: Vector3<f32> = v0.position.into();
        let pos1: Vector3<f32> = v1.position.into();
        let pos2: Vector3<f32> = v2.position.into();

        let uv0: Vector2<f32> = v0.tex_coords.into();
        let uv1: Vector2<f32> = v1.tex_coords.into();
        let uv2: Vector2<f32> = v2.tex_coords.into();

        let delta_pos1 = pos1 - pos0;
        let delta_pos2 = pos2 - pos0;
        let delta_uv1 = uv1 - uv0;
        let delta_uv2 = uv2 - uv0;

        // Solves
        //     delta_pos1 = delta_uv1.x * T + delta_uv1.y * B
        //     delta_pos2 = delta_uv2.x * T + delta_uv2.y * B
        let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
        if det.abs() < f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) * r;
        // Flipped to match wgpu's top-left texture origin
        let bitangent = (delta_pos2 * delta_uv1.x - delta_pos1 * delta_uv2.x) * -r;

        for i in [i0, i1, i2] {
            vertices[i].tangent = (tangent + Vector3::from(vertices[i].tangent)).into();
            vertices[i].bitangent = (bitangent + Vector3::from(vertices[i].bitangent)).into();
            triangles_included[i] += 1;
        }
    }

    for (vertex, n) in vertices.iter_mut().zip(triangles_included) {
        if n == 0 {
            let (tangent, bitangent) = fallback_basis(vertex.normal.into());
            vertex.tangent = tangent.into();
            vertex.bitangent = bitangent.into();
            continue;
        }
        let denom = 1.0 / n as f32;
        vertex.tangent = (Vector3::from(vertex.tangent) * denom).into();
        vertex.bitangent = (Vector3::from(vertex.bitangent) * denom).into();
    }
}

/// Any orthonormal basis around `normal`, for vertices without usable UVs.
fn fallback_basis(normal: Vector3<f32>) -> (Vector3<f32>, Vector3<f32>) {
    let normal = if normal.magnitude2() > 0.0 {
        normal.normalize()
    } else {
        Vector3::unit_z()
    };
    let helper = if normal.x.abs() < 0.9 {
        Vector3::unit_x()
    } else {
        Vector3::unit_y()
    };
    let tangent = helper.cross(normal).normalize();
    (tangent, normal.cross(tangent))
}

/// Builds the bitangent from a glTF `vec4` tangent, whose `w` stores handedness.
pub fn bitangent_from(normal: [f32; 3], tangent: [f32; 4]) -> [f32; 3] {
    let normal: Vector3<f32> = normal.into();
    let tangent: cgmath::Vector4<f32> = tangent.into();
    (normal.cross(tangent.truncate()) * tangent.w).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(position: [f32; 3], tex_coords: [f32; 2]) -> ModelVertex {
        ModelVertex {
            position,
            tex_coords,
            normal: [0.0, 0.0, 1.0],
            ..Default::default()
        }
    }

    #[test]
    fn quad_in_xy_plane_has_x_tangent() {
        let mut vertices = vec![
            vertex([0.0, 0.0, 0.0], [0.0, 1.0]),
            vertex([1.0, 0.0, 0.0], [1.0, 1.0]),
            vertex([1.0, 1.0, 0.0], [1.0, 0.0]),
            vertex([0.0, 1.0, 0.0], [0.0, 0.0]),
        ];
        compute_tangents(&mut vertices, &[0, 1, 2, 0, 2, 3]);
        for v in &vertices {
            let tangent = Vector3::from(v.tangent);
            assert!((tangent - Vector3::unit_x()).magnitude() < 1e-5, "{:?}", v.tangent);
            let bitangent = Vector3::from(v.bitangent);
            assert!((bitangent - Vector3::unit_y()).magnitude() < 1e-5, "{:?}", v.bitangent);
        }
    }

    #[test]
    fn degenerate_uvs_fall_back_to_a_perpendicular_basis() {
        let mut vertices = vec![
            vertex([0.0, 0.0, 0.0], [0.0, 0.0]),
            vertex([1.0, 0.0, 0.0], [0.0, 0.0]),
            vertex([0.0, 1.0, 0.0], [0.0, 0.0]),
        ];
        compute_tangents(&mut vertices, &[0, 1, 2]);
        for v in &vertices {
            let tangent = Vector3::from(v.tangent);
            assert!(tangent.magnitude() > 0.99);
            assert!(tangent.dot(Vector3::from(v.normal)).abs() < 1e-5);
            assert!(v.tangent.iter().all(|c| c.is_finite()));
        }
    }

    #[test]
    fn out_of_range_indices_are_ignored() {
        let mut vertices = vec![vertex([0.0; 3], [0.0; 2])];
        compute_tangents(&mut vertices, &[0, 5, 9]);
        assert!(vertices[0].tangent.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn bitangent_respects_handedness() {
        let right = bitangent_from([0.0, 0.0, 1.0], [1.0, 0.0, 0.0, 1.0]);
        let left = bitangent_from([0.0, 0.0, 1.0], [1.0, 0.0, 0.0, -1.0]);
        assert_eq!(right, [0.0, 1.0, 0.0]);
        assert_eq!(left, [0.0, -1.0, 0.0]);
    }
}
