use itertools::iproduct;

use super::Expr;
use crate::matrix::NDArray;

impl Expr {
    /// Matrix product `a * self`.
    pub fn mul_left(self, a : &NDArray<2>) -> Result<Expr,String> {
        let [m,k] = a.shape();
        let [k2,n] = self.shape;
        if k != k2 {
            return Err(format!("Mismatching shapes for product: {:?} and {:?}",a.shape(),self.shape));
        }
        let ad = a.to_vec();
        let terms : Vec<Vec<(usize,f64)>> = iproduct!(0..m,0..n)
            .map(|(i,j)| (0..k).filter(|&p| ad[i*k+p] != 0.0).map(|p| (p*n+j, ad[i*k+p])).collect())
            .collect();
        Ok(self.combine([m,n], &terms))
    }

    /// Matrix product `self * a`.
    pub fn mul_right(self, a : &NDArray<2>) -> Result<Expr,String> {
        let [m,k] = self.shape;
        let [k2,n] = a.shape();
        if k != k2 {
            return Err(format!("Mismatching shapes for product: {:?} and {:?}",self.shape,a.shape()));
        }
        let ad = a.to_vec();
        let terms : Vec<Vec<(usize,f64)>> = iproduct!(0..m,0..n)
            .map(|(i,j)| (0..k).filter(|&p| ad[p*n+j] != 0.0).map(|p| (i*k+p, ad[p*n+j])).collect())
            .collect();
        Ok(self.combine([m,n], &terms))
    }

    /// Element-wise product with `a`. Either operand may be 1x1.
    pub fn mul_elem(self, a : &NDArray<2>) -> Result<Expr,String> {
        let shape =
            if self.shape == a.shape() || a.shape() == [1,1] { self.shape }
            else if self.is_scalar() { a.shape() }
            else {
                return Err(format!("Mismatching shapes for element-wise product: {:?} and {:?}",self.shape,a.shape()));
            };
        let e = self.broadcast(shape)?;
        let ad = a.to_vec();
        let terms : Vec<Vec<(usize,f64)>> = (0..shape[0]*shape[1])
            .map(|i| vec![(i, if ad.len() == 1 { ad[0] } else { ad[i] })])
            .collect();
        Ok(e.combine(shape, &terms))
    }

    pub fn transpose(self) -> Expr {
        let [m,n] = self.shape;
        let terms : Vec<Vec<(usize,f64)>> = iproduct!(0..n,0..m).map(|(i,j)| vec![(j*n+i,1.0)]).collect();
        self.combine([n,m], &terms)
    }

    /// For a vector, the square matrix with the vector on its diagonal; for a square matrix,
    /// the column vector of its diagonal.
    pub fn diag(self) -> Result<Expr,String> {
        let [m,n] = self.shape;
        if m == 1 || n == 1 {
            let k = m*n;
            let terms : Vec<Vec<(usize,f64)>> = iproduct!(0..k,0..k)
                .map(|(i,j)| if i == j { vec![(i,1.0)] } else { vec![] })
                .collect();
            Ok(self.combine([k,k], &terms))
        }
        else if m == n {
            let terms : Vec<Vec<(usize,f64)>> = (0..n).map(|i| vec![(i*n+i,1.0)]).collect();
            Ok(self.combine([n,1], &terms))
        }
        else {
            Err(format!("diag needs a vector or a square matrix, got shape {:?}",self.shape))
        }
    }

    /// Sum of all elements.
    pub fn sum(self) -> Expr {
        let terms = vec![(0..self.num_elements()).map(|i| (i,1.0)).collect()];
        self.combine([1,1], &terms)
    }

    /// Sum along `axis`: 0 sums each column into a row vector, 1 sums each row into a column
    /// vector.
    pub fn sum_axis(self, axis : usize) -> Result<Expr,String> {
        let [m,n] = self.shape;
        match axis {
            0 => {
                let terms : Vec<Vec<(usize,f64)>> = (0..n).map(|j| (0..m).map(|i| (i*n+j,1.0)).collect()).collect();
                Ok(self.combine([1,n], &terms))
            },
            1 => {
                let terms : Vec<Vec<(usize,f64)>> = (0..m).map(|i| (0..n).map(|j| (i*n+j,1.0)).collect()).collect();
                Ok(self.combine([m,1], &terms))
            },
            _ => Err(format!("Invalid axis {}",axis))
        }
    }

    /// Shift rows down by `k` (up if negative); vacated rows are zero.
    pub fn shift(self, k : i64) -> Expr {
        let [m,n] = self.shape;
        let terms : Vec<Vec<(usize,f64)>> = iproduct!(0..m,0..n)
            .map(|(i,j)| {
                let src = i as i64 - k;
                if src >= 0 && (src as usize) < m { vec![(src as usize*n+j,1.0)] } else { vec![] }
            })
            .collect();
        self.combine([m,n], &terms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix;

    #[test]
    fn products() {
        // x = [x1 x2; x3 x4]
        let x = Expr::from_variables([2,2], &[1,2,3,4]).unwrap();
        let a = matrix::dense([1,2], vec![1.0,2.0]);
        let e = x.clone().mul_left(&a).unwrap();
        assert_eq!(e.shape(), [1,2]);
        assert_eq!(e.element(0), (&[1usize,3][..],&[1.0,2.0][..]));
        assert_eq!(e.element(1), (&[2usize,4][..],&[1.0,2.0][..]));

        let e = x.clone().mul_right(&a.transpose()).unwrap();
        assert_eq!(e.shape(), [2,1]);
        assert_eq!(e.element(1), (&[3usize,4][..],&[1.0,2.0][..]));

        assert!(x.clone().mul_left(&matrix::dense([1,3], vec![1.0,1.0,1.0])).is_err());

        let e = x.clone().mul_elem(&matrix::dense([1,1], vec![3.0])).unwrap();
        assert_eq!(e.element(3), (&[4usize][..],&[3.0][..]));
    }

    #[test]
    fn reshaping() {
        let x = Expr::from_variables([2,3], &[1,2,3,4,5,6]).unwrap();
        let t = x.clone().transpose();
        assert_eq!(t.shape(), [3,2]);
        assert_eq!(t.element(1).0, &[4]);
        let s = x.clone().sum_axis(0).unwrap();
        assert_eq!(s.shape(), [1,3]);
        assert_eq!(s.element(2).0, &[3,6]);
        let s = x.clone().sum();
        assert_eq!(s.element(0).0.len(), 6);
        let sh = x.shift(1);
        assert!(sh.element(0).0.is_empty());
        assert_eq!(sh.element(3).0, &[1]);

        let v = Expr::from_variables([3,1], &[1,2,3]).unwrap();
        let d = v.diag().unwrap();
        assert_eq!(d.shape(), [3,3]);
        assert_eq!(d.element(4).0, &[2]);
        assert!(d.element(1).0.is_empty());
        assert_eq!(d.diag().unwrap().element(2).0, &[3]);
    }
}
