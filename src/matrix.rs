//! This module provides basic array functionality used for constants and parameter values.
//!
use itertools::izip;

/// General n-dimensional dense or sparse array structure. Elements are stored in row-major
/// order; a sparse array stores the linear indexes of its non-zeros in `sp`.
#[derive(Clone,Debug,PartialEq)]
pub struct NDArray<const N : usize> {
    shape : [usize; N],
    sp    : Option<Vec<usize>>,
    data  : Vec<f64>,
}

impl<const N : usize> NDArray<N> {
    /// Create a new [NDArray] from data, checking that the data is valid.
    ///
    /// # Arguments
    /// - `shape` Shape of the array.
    /// - `sp` Sparsity pattern, if the array is sparse, otherwise `None`. If given, sparsity is
    ///   provided as a sorted vector of linear indexes.
    /// - `data` Non-zero coefficients
    pub fn new(shape : [usize;N], sp : Option<Vec<usize>>, data : Vec<f64>) -> Result<NDArray<N>,String> {
        if let Some(sp) = sp {
            if sp.len() > 1 && sp.iter().zip(sp[1..].iter()).any(|(&i0,&i1)| i1 <= i0) {
                Err("Sparsity is unsorted or contains duplicates".to_string())
            }
            else if sp.len() != data.len() {
                Err("Mismatching sparsity and data lengths".to_string())
            }
            else if sp.last().map(|&l| l >= shape.iter().product::<usize>()).unwrap_or(false) {
                Err("Mismatching sparsity and shape".to_string())
            }
            else {
                Ok(NDArray{ shape,sp : Some(sp),data })
            }
        }
        else {
            let nnz : usize = shape.iter().product();
            if nnz != data.len() {
                Err("Mismatching data and shape".to_string())
            }
            else {
                Ok(NDArray{shape,sp:None,data})
            }
        }
    }

    /// Create a new dense [NDArray] from an iterator.
    ///
    /// # Arguments
    /// - `shape` the shape of the array
    /// - `it` iterator generating the coefficients. It must provide at least values enough to fill
    ///   the shape. The remaining elements are not used.
    pub fn dense_from_iter<I>(shape : [usize; N], it : I) -> Result<NDArray<N>,String> where I : Iterator<Item = f64> {
        let totalsize = shape.iter().product();
        let data : Vec<f64> = it.take(totalsize).collect();
        if data.len() < totalsize {
            Err("Insufficient data".to_string())
        }
        else {
            Self::new(shape,None,data)
        }
    }

    /// Create a new sparse array from indexes and coefficient data. Duplicate indexes are summed.
    pub fn from_tuples(shape : [usize; N], index : &[ [usize; N] ], data : &[f64]) -> Result<NDArray<N>,String>{
        if data.len() != index.len() {
            return Err("Mismatching data and index lengths".to_string());
        }
        if index.iter().any(|i| i.iter().zip(shape.iter()).any(|(&j,&d)| j >= d)) {
            return Err("Index out of bounds".to_string());
        }
        let strides = strides(&shape);
        let mut entries : Vec<(usize,f64)> = index.iter()
            .zip(data.iter())
            .map(|(i,&v)| (i.iter().zip(strides.iter()).map(|(j,s)| j*s).sum(), v))
            .collect();
        entries.sort_by_key(|e| e.0);

        let mut sp : Vec<usize> = Vec::with_capacity(entries.len());
        let mut rdata : Vec<f64> = Vec::with_capacity(entries.len());
        for (i,v) in entries {
            if sp.last() == Some(&i) {
                if let Some(last) = rdata.last_mut() { *last += v; }
            }
            else {
                sp.push(i);
                rdata.push(v);
            }
        }
        Ok(NDArray{ shape, sp : Some(sp), data : rdata })
    }

    /// Return the shape
    pub fn shape(&self) -> [usize; N] { self.shape }
    /// Total number of elements, including zeros.
    pub fn size(&self) -> usize { self.shape.iter().product() }
    /// Reshape the array. The total number of elements in the result must be the same as in this.
    pub fn reshape<const M : usize>(self,shape : [usize; M]) -> Result<NDArray<M>,String> {
        if shape.iter().product::<usize>() != self.size() {
            Err(format!("Cannot reshape {:?} into {:?}",self.shape,shape))
        }
        else {
            Ok(NDArray{ shape,sp : self.sp, data : self.data })
        }
    }
    /// Return number of non-zeros.
    pub fn nnz(&self) -> usize { self.data.len() }
    /// Return the array coefficients as a slice.
    pub fn data(&self) -> &[f64] { self.data.as_slice() }
    /// Return the sparsity pattern, if present.
    pub fn sparsity(&self) -> Option<&[usize]> { self.sp.as_deref() }
    /// Multiply all coefficients by a scalar, inplace.
    pub fn inplace_mul_scalar(&mut self, s : f64) { self.data.iter_mut().for_each(|v| *v *= s); }
    /// Return the array items. This consumes the array.
    pub fn dissolve(self) -> ([usize;N],Option<Vec<usize>>,Vec<f64>) { (self.shape,self.sp,self.data) }

    /// Turns a sparse array into a dense array.
    pub fn to_dense(&self) -> NDArray<N> {
        if let Some(ref sp) = self.sp {
            let mut data = vec![0.0; self.size()];
            for (&i,&f) in izip!(sp.iter(),self.data.iter()) {
                data[i] = f;
            }
            NDArray{ shape : self.shape, sp : None, data }
        }
        else {
            self.clone()
        }
    }

    /// Dense element vector in row-major order.
    pub fn to_vec(&self) -> Vec<f64> { self.to_dense().data }

    /// Apply `f` to every element, including implicit zeros.
    pub fn map<F>(&self, f : F) -> NDArray<N> where F : Fn(f64) -> f64 {
        let d = self.to_dense();
        NDArray{ shape : d.shape, sp : None, data : d.data.into_iter().map(f).collect() }
    }

    pub fn mul_scalar(mut self, v : f64) -> Self {
        self.inplace_mul_scalar(v);
        self
    }
}

impl NDArray<2> {
    pub fn height(&self) -> usize { self.shape[0] }
    pub fn width(&self) -> usize { self.shape[1] }
    pub fn is_square(&self) -> bool { self.shape[0] == self.shape[1] }

    /// Element `(i,j)`. Panics if out of bounds.
    pub fn get(&self, i : usize, j : usize) -> f64 {
        assert!(i < self.shape[0] && j < self.shape[1]);
        let k = i * self.shape[1] + j;
        if let Some(ref sp) = self.sp {
            sp.binary_search(&k).map(|p| self.data[p]).unwrap_or(0.0)
        }
        else {
            self.data[k]
        }
    }

    pub fn transpose(&self) -> NDArray<2> {
        let (m,n) = (self.shape[0],self.shape[1]);
        let d = self.to_dense();
        NDArray{
            shape : [n,m],
            sp    : None,
            data  : (0..n).flat_map(|j| (0..m).map(move |i| (i,j))).map(|(i,j)| d.data[i*n+j]).collect(),
        }
    }

    /// Matrix product `self * rhs`.
    pub fn matmul(&self, rhs : &NDArray<2>) -> Result<NDArray<2>,String> {
        if self.shape[1] != rhs.shape[0] {
            return Err(format!("Mismatching shapes for product: {:?} and {:?}",self.shape,rhs.shape));
        }
        let (m,k,n) = (self.shape[0],self.shape[1],rhs.shape[1]);
        let a = self.to_dense();
        let b = rhs.to_dense();
        let mut data = vec![0.0; m*n];
        for i in 0..m {
            for p in 0..k {
                let aip = a.data[i*k+p];
                if aip != 0.0 {
                    for (t,&bv) in data[i*n..(i+1)*n].iter_mut().zip(b.data[p*n..(p+1)*n].iter()) {
                        *t += aip * bv;
                    }
                }
            }
        }
        NDArray::new([m,n],None,data)
    }

    /// Element-wise product.
    pub fn mul_elem(&self, rhs : &NDArray<2>) -> Result<NDArray<2>,String> {
        if self.shape != rhs.shape {
            return Err(format!("Mismatching shapes for element-wise product: {:?} and {:?}",self.shape,rhs.shape));
        }
        NDArray::new(self.shape,None,izip!(self.to_vec(),rhs.to_vec()).map(|(a,b)| a*b).collect())
    }

    /// Inverse of a square matrix by Gauss-Jordan elimination with partial pivoting.
    pub fn inverse(&self) -> Result<NDArray<2>,String> {
        if ! self.is_square() {
            return Err(format!("Cannot invert non-square matrix of shape {:?}",self.shape));
        }
        let n = self.shape[0];
        let mut a = self.to_vec();
        let mut inv = eye(n).data;
        for c in 0..n {
            let p = (c..n)
                .max_by(|&i,&j| a[i*n+c].abs().total_cmp(&a[j*n+c].abs()))
                .unwrap_or(c);
            if a[p*n+c].abs() < 1e-12 {
                return Err("Matrix is singular".to_string());
            }
            if p != c {
                for j in 0..n {
                    a.swap(p*n+j, c*n+j);
                    inv.swap(p*n+j, c*n+j);
                }
            }
            let d = a[c*n+c];
            for j in 0..n {
                a[c*n+j] /= d;
                inv[c*n+j] /= d;
            }
            for i in (0..n).filter(|&i| i != c) {
                let f = a[i*n+c];
                if f != 0.0 {
                    for j in 0..n {
                        a[i*n+j] -= f * a[c*n+j];
                        inv[i*n+j] -= f * inv[c*n+j];
                    }
                }
            }
        }
        NDArray::new([n,n],None,inv)
    }
}

impl<const N : usize> std::ops::Mul<f64> for NDArray<N> {
    type Output = NDArray<N>;
    fn mul(self, rhs: f64) -> Self::Output { self.mul_scalar(rhs) }
}

fn strides<const N : usize>(shape : &[usize;N]) -> [usize;N] {
    let mut strides = [0usize;N];
    _ = strides.iter_mut().zip(shape.iter()).rev().fold(1usize, |c,(s,d)| { *s = c; c*d });
    strides
}

/// Dense array from data.
pub fn dense<const N : usize,D>(shape : [usize;N], data : D) -> NDArray<N> where D : Into<Vec<f64>> {
    let data = data.into();
    assert_eq!(shape.iter().product::<usize>(), data.len());
    NDArray{ shape, sp : None, data }
}

pub fn zeros<const N : usize>(shape : [usize;N]) -> NDArray<N> {
    NDArray{ shape, sp : Some(Vec::new()), data : Vec::new() }
}

pub fn ones<const N : usize>(shape : [usize; N]) -> NDArray<N> {
    NDArray{ shape, sp : None, data : vec![1.0; shape.iter().product()] }
}

/// Sparse identity matrix.
pub fn speye(dim : usize) -> NDArray<2> {
    NDArray{ shape : [dim,dim], sp : Some((0..dim).map(|i| i*(dim+1)).collect()), data : vec![1.0; dim] }
}

/// Dense identity matrix.
pub fn eye(dim : usize) -> NDArray<2> { speye(dim).to_dense() }

/// Square matrix with ones on and below the diagonal.
pub fn tril_ones(dim : usize) -> NDArray<2> {
    let sp : Vec<usize> = (0..dim).flat_map(|i| (0..=i).map(move |j| i*dim+j)).collect();
    let n = sp.len();
    NDArray{ shape : [dim,dim], sp : Some(sp), data : vec![1.0; n] }
}
